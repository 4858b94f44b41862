//! Tag collector for rendered output.
//!
//! Content reads record the tags they attach via `tokio::task_local!`. The response cache
//! middleware collects them at the end of the handler and annotates the cached page with the
//! same tags, so invalidating a domain also drops every page built from it.

use std::cell::RefCell;
use std::collections::HashSet;
use std::future::Future;

use super::tags::CacheTag;

tokio::task_local! {
    static TAGS: RefCell<HashSet<CacheTag>>;
}

/// Record tags read by the current task. Ignored when no collector is active.
pub fn record<'a>(tags: impl IntoIterator<Item = &'a CacheTag>) {
    let _ = TAGS.try_with(|collected| {
        collected.borrow_mut().extend(tags.into_iter().cloned());
    });
}

/// Tags recorded so far in the current collector, or none outside one.
pub fn collect() -> HashSet<CacheTag> {
    TAGS.try_with(|collected| collected.borrow().clone())
        .unwrap_or_default()
}

/// Run `f` with a fresh collector and return its output with the tags it recorded.
pub async fn with_collector<F, R>(f: F) -> (R, HashSet<CacheTag>)
where
    F: Future<Output = R>,
{
    TAGS.scope(RefCell::new(HashSet::new()), async move {
        let output = f.await;
        (output, collect())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(value: &str) -> CacheTag {
        CacheTag::parse(value).expect("valid tag")
    }

    #[tokio::test]
    async fn record_without_collector_is_no_op() {
        record([&tag("blogs")]);
        assert!(collect().is_empty());
    }

    #[tokio::test]
    async fn with_collector_captures_tags() {
        let (value, tags) = with_collector(async {
            record([&tag("blogs"), &tag("authors")]);
            record([&tag("blog:hello")]);
            7
        })
        .await;

        assert_eq!(value, 7);
        assert_eq!(tags.len(), 3);
        assert!(tags.contains(&tag("blog:hello")));
    }

    #[tokio::test]
    async fn record_deduplicates() {
        let (_, tags) = with_collector(async {
            record([&tag("faqs")]);
            record([&tag("faqs"), &tag("faqs")]);
        })
        .await;

        assert_eq!(tags.len(), 1);
    }

    #[tokio::test]
    async fn nested_collectors_are_isolated() {
        let (inner, outer) = with_collector(async {
            record([&tag("pricing")]);
            let (_, inner) = with_collector(async {
                record([&tag("faqs")]);
            })
            .await;
            inner
        })
        .await;

        assert!(inner.contains(&tag("faqs")) && !inner.contains(&tag("pricing")));
        assert!(outer.contains(&tag("pricing")) && !outer.contains(&tag("faqs")));
    }
}
