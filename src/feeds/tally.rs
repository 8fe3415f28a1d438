use super::Post;
use crate::classify::{self, Category};

/// Per-account counts of posts mentioning each camp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostTally {
    pub total: usize,
    pub left: usize,
    pub right: usize,
}

impl PostTally {
    pub fn from_posts(posts: &[Post]) -> Self {
        let mut tally = Self::default();
        for post in posts {
            tally.add(post);
        }
        tally
    }

    pub fn add(&mut self, post: &Post) {
        self.total += 1;
        for category in classify::categories(post_text(post)) {
            match category {
                Category::Left => self.left += 1,
                Category::Right => self.right += 1,
            }
        }
    }
}

/// The text body of a post: the server's `Text` field, `text`, or the post itself when it is a bare string.
pub fn post_text(post: &Post) -> String {
    if post.is_string() {
        return classify::trim(post.clone());
    }
    ["Text", "text"]
        .into_iter()
        .find_map(|key| classify::prop(post, key))
        .map(|text| classify::trim(text.clone()))
        .unwrap_or_default()
}
