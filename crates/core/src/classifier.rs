// crates/core/src/classifier.rs
//! Context classifier: is this page the target application, and which face?
//!
//! An ordered table of named rules, first hit wins:
//! - POS signals (address, then DOM) short-circuit everything else
//! - DOM app marker
//! - Address conventions (host, path, navigation query/fragment)
//! - Fallback: not a target page
//!
//! Address rules never need the page, so classification works at navigation
//! start. The DOM probe runs lazily, at most once, and only when an address
//! rule before it did not already decide. A failed probe counts as "no DOM
//! evidence".

use std::sync::Arc;

use odoo_inspector_types::{ContextVerdict, InterfaceKind};
use serde::Serialize;
use url::Url;

use crate::codec::path_segments;
use crate::conventions::TargetConventions;
use crate::probe::{DomProbe, ProbeOutput};

/// One independent piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    PosPath,
    PosQueryParam,
    PosDom,
    AppMarkerDom,
    TargetHost,
    TargetPath,
    NavigationQuery,
    NavigationFragment,
}

impl Signal {
    pub fn needs_dom(self) -> bool {
        matches!(self, Self::PosDom | Self::AppMarkerDom)
    }
}

/// What a matching rule concludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Point-of-sale client, special mode.
    Pos,
    /// Target page: backend when the first path segment is a backend
    /// segment, website otherwise.
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub name: &'static str,
    pub signal: Signal,
    pub outcome: Outcome,
}

const fn rule(name: &'static str, signal: Signal, outcome: Outcome) -> Rule {
    Rule { name, signal, outcome }
}

/// Priority-ordered rule table.
pub const RULES: &[Rule] = &[
    rule("pos-path", Signal::PosPath, Outcome::Pos),
    rule("pos-query-param", Signal::PosQueryParam, Outcome::Pos),
    rule("pos-dom", Signal::PosDom, Outcome::Pos),
    rule("app-marker-dom", Signal::AppMarkerDom, Outcome::Target),
    rule("target-host", Signal::TargetHost, Outcome::Target),
    rule("target-path", Signal::TargetPath, Outcome::Target),
    rule("navigation-query", Signal::NavigationQuery, Outcome::Target),
    rule("navigation-fragment", Signal::NavigationFragment, Outcome::Target),
];

/// Verdict plus the rule that produced it (`None` for the fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub verdict: ContextVerdict,
    pub rule: Option<&'static str>,
    pub probed: bool,
}

#[derive(Clone)]
pub struct ContextClassifier {
    conventions: Arc<TargetConventions>,
}

impl Default for ContextClassifier {
    fn default() -> Self {
        Self::new(TargetConventions::default())
    }
}

impl ContextClassifier {
    pub fn new(conventions: TargetConventions) -> Self {
        Self {
            conventions: Arc::new(conventions),
        }
    }

    pub fn conventions(&self) -> &TargetConventions {
        &self.conventions
    }

    /// Classify, running the DOM probe only if an address rule has not
    /// already decided.
    pub async fn classify(&self, address: &str, probe: &dyn DomProbe) -> Classification {
        let url = Url::parse(address).ok();
        let mut dom: Option<Option<ProbeOutput>> = None;

        for rule in RULES {
            let hit = if rule.signal.needs_dom() {
                if dom.is_none() {
                    dom = Some(match probe.probe(&self.conventions.probe).await {
                        Ok(output) => Some(output),
                        Err(e) => {
                            tracing::warn!(address, error = %e, "DOM probe failed, using address evidence only");
                            None
                        }
                    });
                }
                match &dom {
                    Some(Some(output)) => self.dom_signal(rule.signal, output),
                    _ => false,
                }
            } else {
                url.as_ref().is_some_and(|u| self.address_signal(rule.signal, u))
            };

            if hit {
                return self.conclude(rule, url.as_ref(), dom.is_some());
            }
        }

        Classification {
            verdict: ContextVerdict::NOT_TARGET,
            rule: None,
            probed: dom.is_some(),
        }
    }

    /// Pure classification against evidence already at hand. `probe: None`
    /// means no DOM evidence.
    pub fn classify_with(&self, address: &str, probe: Option<&ProbeOutput>) -> Classification {
        let url = Url::parse(address).ok();
        let hit = RULES.iter().find(|rule| {
            if rule.signal.needs_dom() {
                probe.is_some_and(|output| self.dom_signal(rule.signal, output))
            } else {
                url.as_ref().is_some_and(|u| self.address_signal(rule.signal, u))
            }
        });
        match hit {
            Some(rule) => self.conclude(rule, url.as_ref(), probe.is_some()),
            None => Classification {
                verdict: ContextVerdict::NOT_TARGET,
                rule: None,
                probed: probe.is_some(),
            },
        }
    }

    fn conclude(&self, rule: &Rule, url: Option<&Url>, probed: bool) -> Classification {
        let kind = match rule.outcome {
            Outcome::Pos => InterfaceKind::Pos,
            Outcome::Target => {
                if url.is_some_and(|u| self.is_backend_path(u)) {
                    InterfaceKind::Backend
                } else {
                    InterfaceKind::Website
                }
            }
        };
        tracing::debug!(rule = rule.name, kind = ?kind, "page classified");
        Classification {
            verdict: ContextVerdict::target(kind),
            rule: Some(rule.name),
            probed,
        }
    }

    fn dom_signal(&self, signal: Signal, output: &ProbeOutput) -> bool {
        match signal {
            Signal::PosDom => output.is_pos(),
            Signal::AppMarkerDom => output.has_app_marker,
            _ => false,
        }
    }

    fn address_signal(&self, signal: Signal, url: &Url) -> bool {
        let c = &*self.conventions;
        match signal {
            Signal::PosPath => self.is_pos_path(url),
            Signal::PosQueryParam => has_any_param(url, &c.pos_query_params),
            Signal::TargetHost => url.host_str().is_some_and(|host| {
                let host = host.to_ascii_lowercase();
                c.target_hosts.iter().any(|h| host.contains(h.as_str()))
            }),
            Signal::TargetPath => self.is_backend_path(url),
            Signal::NavigationQuery => has_any_param(url, &c.navigation_query_params),
            Signal::NavigationFragment => url
                .fragment()
                .is_some_and(|f| c.navigation_fragment_markers.iter().any(|m| f.contains(m.as_str()))),
            Signal::PosDom | Signal::AppMarkerDom => false,
        }
    }

    /// `/pos`, `/pos/...`, or `.../pos/ui`, `.../pos/web` anywhere.
    fn is_pos_path(&self, url: &Url) -> bool {
        let c = &*self.conventions;
        let segments = lowered_segments(url);
        if segments.first().is_some_and(|s| *s == c.pos_segment) {
            return true;
        }
        segments.windows(2).any(|pair| {
            pair[0] == c.pos_segment && c.pos_subpaths.iter().any(|sub| *sub == pair[1])
        })
    }

    /// First path segment is one of the backend's fixed segments.
    pub fn is_backend_path(&self, url: &Url) -> bool {
        lowered_segments(url)
            .first()
            .is_some_and(|first| self.conventions.backend_segments.iter().any(|s| s == first))
    }
}

fn lowered_segments(url: &Url) -> Vec<String> {
    path_segments(url).into_iter().map(str::to_ascii_lowercase).collect()
}

fn has_any_param(url: &Url, names: &[String]) -> bool {
    url.query_pairs().any(|(key, _)| names.iter().any(|n| *n == key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::probe::{DomSnapshot, ElementInfo, NoProbe, ProbeSpec};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts probe invocations.
    struct CountingProbe {
        output: Result<ProbeOutput, HostError>,
        calls: AtomicUsize,
    }

    impl CountingProbe {
        fn new(output: Result<ProbeOutput, HostError>) -> Self {
            Self {
                output,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DomProbe for CountingProbe {
        async fn probe(&self, _spec: &ProbeSpec) -> Result<ProbeOutput, HostError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output.clone()
        }
    }

    fn marker() -> ProbeOutput {
        ProbeOutput {
            has_app_marker: true,
            ..ProbeOutput::default()
        }
    }

    fn pos_dom() -> ProbeOutput {
        ProbeOutput {
            has_pos_body_class: true,
            ..ProbeOutput::default()
        }
    }

    fn classify(address: &str, probe: Option<ProbeOutput>) -> Classification {
        ContextClassifier::default().classify_with(address, probe.as_ref())
    }

    #[test]
    fn test_rule_table_order() {
        let names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "pos-path",
                "pos-query-param",
                "pos-dom",
                "app-marker-dom",
                "target-host",
                "target-path",
                "navigation-query",
                "navigation-fragment",
            ]
        );
    }

    #[test]
    fn test_pos_paths() {
        for address in [
            "https://x.test/pos",
            "https://x.test/pos/ui?config_id=3",
            "https://x.test/POS/web",
            "https://x.test/shop/pos/ui",
        ] {
            let c = classify(address, None);
            assert_eq!(c.verdict, ContextVerdict::POS, "{address}");
            assert_eq!(c.rule, Some("pos-path"));
        }
        assert_eq!(classify("https://x.test/shop/pos-terminal", None).verdict, ContextVerdict::NOT_TARGET);
    }

    #[test]
    fn test_pos_query_param() {
        let c = classify("https://x.test/somewhere?config_id=1", None);
        assert_eq!(c.verdict, ContextVerdict::POS);
        assert_eq!(c.rule, Some("pos-query-param"));
    }

    #[test]
    fn test_pos_wins_over_backend() {
        let c = classify("https://x.test/web/pos?config_id=2", Some(marker()));
        assert_eq!(c.verdict.interface_kind, InterfaceKind::Pos);

        let c = classify("https://x.test/odoo/action-7", Some(pos_dom()));
        assert_eq!(c.verdict, ContextVerdict::POS);
        assert_eq!(c.rule, Some("pos-dom"));
    }

    #[test]
    fn test_dom_marker_backend_vs_website() {
        let c = classify("https://erp.acme.test/web", Some(marker()));
        assert_eq!(c.verdict, ContextVerdict::target(InterfaceKind::Backend));
        assert_eq!(c.rule, Some("app-marker-dom"));

        let c = classify("https://www.acme.test/shop/product-1", Some(marker()));
        assert_eq!(c.verdict, ContextVerdict::target(InterfaceKind::Website));
    }

    #[test]
    fn test_address_conventions() {
        let c = classify("https://acme.odoo.com/", None);
        assert_eq!(c.verdict, ContextVerdict::target(InterfaceKind::Website));
        assert_eq!(c.rule, Some("target-host"));

        let c = classify("https://acme.odoo.com/odoo/sales", None);
        assert_eq!(c.verdict, ContextVerdict::target(InterfaceKind::Backend));

        let c = classify("http://localhost:8069/web/login", None);
        assert_eq!(c.verdict, ContextVerdict::target(InterfaceKind::Backend));
        assert_eq!(c.rule, Some("target-path"));
    }

    #[test]
    fn test_navigation_signals() {
        let c = classify("https://acme.test/odoo?action=12", None);
        assert_eq!(c.verdict, ContextVerdict::target(InterfaceKind::Backend));
        assert_eq!(c.rule, Some("target-path"));

        let c = classify("https://erp.acme.test/web#cids=1&action=4", None);
        assert_eq!(c.verdict, ContextVerdict::target(InterfaceKind::Backend));

        let c = classify("https://acme.test/?menu_id=3", None);
        assert_eq!(c.verdict, ContextVerdict::target(InterfaceKind::Website));
        assert_eq!(c.rule, Some("navigation-query"));

        let c = classify("https://acme.test/shop/cart?model=x&category=2", None);
        assert_eq!(c.verdict.interface_kind, InterfaceKind::Website);
    }

    #[test]
    fn test_navigation_hits_off_backend_paths_are_website() {
        for (address, rule) in [
            ("https://erp.acme.test/apps/main?action=12", "navigation-query"),
            ("https://news.example/articles/today?action=share", "navigation-query"),
            ("https://blog.example/posts/2024/x?debug=true", "navigation-query"),
            ("https://acme.test/a/b#cids=1&action=4", "navigation-fragment"),
        ] {
            let c = classify(address, None);
            assert_eq!(c.verdict, ContextVerdict::target(InterfaceKind::Website), "{address}");
            assert_eq!(c.rule, Some(rule), "{address}");
        }
    }

    #[test]
    fn test_generic_pages_are_not_targets() {
        for address in [
            "https://example.com/",
            "https://example.com/blog/web-design",
            "https://example.com/website/about",
            "not a url",
        ] {
            let c = classify(address, None);
            assert_eq!(c.verdict, ContextVerdict::NOT_TARGET, "{address}");
            assert_eq!(c.rule, None);
        }
    }

    #[tokio::test]
    async fn test_pos_address_skips_probe() {
        let probe = CountingProbe::new(Ok(marker()));
        let c = ContextClassifier::default()
            .classify("https://x.test/pos/ui?config_id=3", &probe)
            .await;
        assert_eq!(c.verdict, ContextVerdict::POS);
        assert!(!c.probed);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_probe_runs_once() {
        let probe = CountingProbe::new(Ok(ProbeOutput::default()));
        let c = ContextClassifier::default()
            .classify("https://example.com/page", &probe)
            .await;
        assert_eq!(c.verdict, ContextVerdict::NOT_TARGET);
        assert!(c.probed);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_failure_falls_back_to_address() {
        let classifier = ContextClassifier::default();
        let c = classifier.classify("https://x.test/odoo/crm", &NoProbe).await;
        assert_eq!(c.verdict, ContextVerdict::target(InterfaceKind::Backend));
        assert_eq!(c.rule, Some("target-path"));

        let c = classifier.classify("https://example.com/", &NoProbe).await;
        assert_eq!(c.verdict, ContextVerdict::NOT_TARGET);
    }

    #[tokio::test]
    async fn test_dom_upgrades_unknown_address() {
        let page = DomSnapshot {
            elements: vec![ElementInfo::new("script").with_id("web.layout.odooscript")],
            ..DomSnapshot::default()
        };
        let c = ContextClassifier::default()
            .classify("https://www.acme.test/contactus", &page)
            .await;
        assert_eq!(c.verdict, ContextVerdict::target(InterfaceKind::Website));
        assert_eq!(c.rule, Some("app-marker-dom"));
    }

    #[test]
    fn test_custom_conventions() {
        let conventions = TargetConventions {
            target_hosts: vec!["erp.internal".into()],
            ..TargetConventions::default()
        };
        let c = ContextClassifier::new(conventions).classify_with("https://erp.internal/odoo", None);
        assert_eq!(c.rule, Some("target-host"));
        assert_eq!(c.verdict.interface_kind, InterfaceKind::Backend);
    }
}
