use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::Result;

/// Outcome of comparing a fresh fetch against the stored baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Changed,
    Unchanged,
}

/// Decides whether new content differs meaningfully from the baseline.
///
/// The caller owns the baseline: it advances the snapshot only on a
/// `Changed` verdict, so an "unchanged" semantic verdict keeps comparing
/// future fetches against the same original baseline rather than drifting
/// it across cosmetic noise.
#[async_trait]
pub trait ChangeClassifier: Send + Sync {
    async fn classify(&self, url: &str, previous: &str, current: &str) -> Result<Verdict>;
}

/// Byte-for-byte comparison.
pub struct ExactClassifier;

#[async_trait]
impl ChangeClassifier for ExactClassifier {
    async fn classify(&self, _url: &str, previous: &str, current: &str) -> Result<Verdict> {
        Ok(if previous != current {
            Verdict::Changed
        } else {
            Verdict::Unchanged
        })
    }
}

/// External text-classification service answering whether the difference
/// between two page snapshots is user-meaningful.
#[async_trait]
pub trait SignificanceJudge: Send + Sync {
    /// Returns the judge's raw reply text (expected to be YES or NO).
    async fn judge(&self, url: &str, previous: &str, current: &str) -> Result<String>;
}

/// Delegates the changed/unchanged decision to a [`SignificanceJudge`].
///
/// Both sides of the diff are truncated to `prefix_limit` characters before
/// transmission. Replies other than a strict yes/no are treated as
/// "unchanged", so a confused judge can never cause a spurious alert.
pub struct SemanticClassifier {
    judge: Arc<dyn SignificanceJudge>,
    prefix_limit: usize,
}

impl SemanticClassifier {
    pub fn new(judge: Arc<dyn SignificanceJudge>, prefix_limit: usize) -> Self {
        Self {
            judge,
            prefix_limit,
        }
    }
}

#[async_trait]
impl ChangeClassifier for SemanticClassifier {
    async fn classify(&self, url: &str, previous: &str, current: &str) -> Result<Verdict> {
        // Byte-identical content needs no judgment call.
        if previous == current {
            return Ok(Verdict::Unchanged);
        }

        let prev = truncate_chars(previous, self.prefix_limit);
        let cur = truncate_chars(current, self.prefix_limit);
        let reply = self.judge.judge(url, prev, cur).await?;

        Ok(parse_verdict(&reply, url))
    }
}

fn parse_verdict(reply: &str, url: &str) -> Verdict {
    let trimmed = reply.trim();
    if trimmed.eq_ignore_ascii_case("yes") {
        Verdict::Changed
    } else if trimmed.eq_ignore_ascii_case("no") {
        Verdict::Unchanged
    } else {
        warn!(%url, reply = trimmed, "unparsable judge reply; treating as unchanged");
        Verdict::Unchanged
    }
}

/// Char-boundary-safe prefix truncation.
fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeJudge {
        reply: Mutex<Option<Result<String>>>,
        calls: AtomicUsize,
        last_payload: Mutex<Option<(String, String)>>,
    }

    impl FakeJudge {
        fn with_reply(reply: &str) -> Self {
            let judge = Self::default();
            *judge.reply.lock().unwrap() = Some(Ok(reply.to_string()));
            judge
        }

        fn failing() -> Self {
            let judge = Self::default();
            *judge.reply.lock().unwrap() =
                Some(Err(Error::Classify("service unreachable".to_string())));
            judge
        }
    }

    #[async_trait]
    impl SignificanceJudge for FakeJudge {
        async fn judge(&self, _url: &str, previous: &str, current: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_payload.lock().unwrap() =
                Some((previous.to_string(), current.to_string()));
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok("NO".to_string()))
        }
    }

    #[tokio::test]
    async fn exact_reports_any_byte_difference() {
        let c = ExactClassifier;
        assert_eq!(c.classify("u", "a", "a").await.unwrap(), Verdict::Unchanged);
        assert_eq!(c.classify("u", "a", "b").await.unwrap(), Verdict::Changed);
        assert_eq!(
            c.classify("u", "a", "a ").await.unwrap(),
            Verdict::Changed,
            "trailing whitespace is a real byte difference"
        );
    }

    #[tokio::test]
    async fn semantic_parses_yes_no_case_insensitively() {
        for (reply, want) in [
            ("YES", Verdict::Changed),
            ("yes", Verdict::Changed),
            (" Yes\n", Verdict::Changed),
            ("NO", Verdict::Unchanged),
            ("no", Verdict::Unchanged),
        ] {
            let judge = Arc::new(FakeJudge::with_reply(reply));
            let c = SemanticClassifier::new(judge, 1000);
            assert_eq!(c.classify("u", "a", "b").await.unwrap(), want, "reply {reply:?}");
        }
    }

    #[tokio::test]
    async fn semantic_treats_unparsable_reply_as_unchanged() {
        for reply in ["maybe", "", "YES, definitely", "Y"] {
            let judge = Arc::new(FakeJudge::with_reply(reply));
            let c = SemanticClassifier::new(judge, 1000);
            assert_eq!(
                c.classify("u", "a", "b").await.unwrap(),
                Verdict::Unchanged,
                "reply {reply:?}"
            );
        }
    }

    #[tokio::test]
    async fn semantic_propagates_judge_errors() {
        let judge = Arc::new(FakeJudge::failing());
        let c = SemanticClassifier::new(judge, 1000);
        assert!(c.classify("u", "a", "b").await.is_err());
    }

    #[tokio::test]
    async fn semantic_skips_judge_for_identical_content() {
        let judge = Arc::new(FakeJudge::with_reply("YES"));
        let c = SemanticClassifier::new(judge.clone(), 1000);
        assert_eq!(c.classify("u", "same", "same").await.unwrap(), Verdict::Unchanged);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn semantic_truncates_before_transmission() {
        let judge = Arc::new(FakeJudge::with_reply("NO"));
        let c = SemanticClassifier::new(judge.clone(), 4);
        let prev = "aaaaaaaaaa";
        let cur = "éééééééééé"; // multi-byte chars must not split
        c.classify("u", prev, cur).await.unwrap();

        let (sent_prev, sent_cur) = judge.last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(sent_prev, "aaaa");
        assert_eq!(sent_cur, "éééé");
    }
}
