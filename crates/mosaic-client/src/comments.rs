//! One level of threaded comments.
//!
//! A reply to a reply is shown under the root its parent belongs to. A
//! reply whose parent is not loaded is shown as a root.

use std::collections::HashMap;

use mosaic_shared::models::Comment;
use mosaic_shared::types::CommentId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode {
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentThread {
    roots: Vec<ThreadNode>,
    /// Which root each held comment lives under.
    root_of: HashMap<CommentId, CommentId>,
}

impl CommentThread {
    /// Thread `comments`, oldest first at both levels.
    pub fn build(mut comments: Vec<Comment>) -> Self {
        comments.sort_by_key(|c| (c.created_at, c.id));

        let mut thread = Self::default();
        for comment in comments {
            thread.insert(comment);
        }
        thread
    }

    pub fn roots(&self) -> &[ThreadNode] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.root_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root_of.is_empty()
    }

    /// Add one comment, e.g. the server's copy of one we just posted.
    /// Returns `false` if its id is already held.
    pub fn insert(&mut self, comment: Comment) -> bool {
        if self.root_of.contains_key(&comment.id) {
            return false;
        }

        let root = comment
            .reply_to
            .and_then(|parent| self.root_of.get(&parent).copied());

        match root.and_then(|id| self.roots.iter_mut().find(|n| n.comment.id == id)) {
            Some(node) => {
                self.root_of.insert(comment.id, node.comment.id);
                node.replies.push(comment);
            }
            None => {
                self.root_of.insert(comment.id, comment.id);
                self.roots.push(ThreadNode {
                    comment,
                    replies: Vec::new(),
                });
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mosaic_shared::models::UserSummary;
    use mosaic_shared::types::UserId;

    fn comment(id: i64, reply_to: Option<i64>, secs: i64) -> Comment {
        Comment {
            id: CommentId(id),
            author: UserSummary {
                id: UserId(1),
                username: "ana".into(),
                avatar: None,
            },
            text: format!("c{id}"),
            reply_to: reply_to.map(CommentId),
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            target: None,
        }
    }

    fn shape(thread: &CommentThread) -> Vec<(i64, Vec<i64>)> {
        thread
            .roots()
            .iter()
            .map(|n| (n.comment.id.0, n.replies.iter().map(|r| r.id.0).collect()))
            .collect()
    }

    #[test]
    fn test_replies_nest_one_level() {
        let thread = CommentThread::build(vec![
            comment(3, Some(1), 3),
            comment(1, None, 1),
            comment(2, None, 2),
            comment(4, Some(3), 4),
            comment(5, Some(2), 5),
        ]);
        assert_eq!(shape(&thread), vec![(1, vec![3, 4]), (2, vec![5])]);
        assert_eq!(thread.len(), 5);
    }

    #[test]
    fn test_orphan_reply_becomes_root() {
        let thread = CommentThread::build(vec![comment(8, Some(99), 0)]);
        assert_eq!(shape(&thread), vec![(8, vec![])]);
    }

    #[test]
    fn test_insert_ignores_known_id() {
        let mut thread = CommentThread::build(vec![comment(1, None, 0)]);
        assert!(thread.insert(comment(2, Some(1), 1)));
        assert!(!thread.insert(comment(2, Some(1), 1)));
        assert_eq!(shape(&thread), vec![(1, vec![2])]);
    }
}
