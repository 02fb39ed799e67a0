//! Grouping of analysis factors for display.

use serde::Serialize;

use crate::types::{FactorItem, FactorKind};

/// Factors partitioned by polarity.
///
/// Each group keeps the relative order the factors had in the service
/// response, and every input factor lands in exactly one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FactorGroups {
    pub positive: Vec<FactorItem>,
    pub negative: Vec<FactorItem>,
    pub neutral: Vec<FactorItem>,
}

/// A titled block of same-polarity factors, ready to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactorSection<'a> {
    pub kind: FactorKind,
    pub title: &'static str,
    pub factors: &'a [FactorItem],
}

impl FactorSection<'_> {
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

/// Section heading for each polarity.
pub fn section_title(kind: FactorKind) -> &'static str {
    match kind {
        FactorKind::Positive => "Credibility Indicators",
        FactorKind::Negative => "Warning Signs",
        FactorKind::Neutral => "Additional Context",
    }
}

/// Stable partition of `factors` by kind.
pub fn group_factors(factors: &[FactorItem]) -> FactorGroups {
    let mut groups = FactorGroups::default();
    for factor in factors {
        groups.group_mut(factor.kind).push(factor.clone());
    }
    groups
}

impl FactorGroups {
    pub fn group(&self, kind: FactorKind) -> &[FactorItem] {
        match kind {
            FactorKind::Positive => &self.positive,
            FactorKind::Negative => &self.negative,
            FactorKind::Neutral => &self.neutral,
        }
    }

    fn group_mut(&mut self, kind: FactorKind) -> &mut Vec<FactorItem> {
        match kind {
            FactorKind::Positive => &mut self.positive,
            FactorKind::Negative => &mut self.negative,
            FactorKind::Neutral => &mut self.neutral,
        }
    }

    /// Total number of factors across all groups.
    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len() + self.neutral.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sections in display order: indicators, warnings, then context.
    ///
    /// Empty sections are left out unless `include_empty` is set.
    pub fn sections(&self, include_empty: bool) -> Vec<FactorSection<'_>> {
        [FactorKind::Positive, FactorKind::Negative, FactorKind::Neutral]
            .into_iter()
            .map(|kind| FactorSection {
                kind,
                title: section_title(kind),
                factors: self.group(kind),
            })
            .filter(|section| include_empty || !section.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed() -> Vec<FactorItem> {
        vec![
            FactorItem::negative("Anonymous sourcing", "No named sources."),
            FactorItem::positive("Primary documents", "Links the court filing."),
            FactorItem::neutral("Opinion section", "Published as commentary."),
            FactorItem::positive("Corrections policy", "Outlet issues corrections."),
            FactorItem::negative("Clickbait headline", "Headline overstates the story."),
        ]
    }

    #[test]
    fn test_group_preserves_order_within_kind() {
        let groups = group_factors(&mixed());
        let titles = |items: &[FactorItem]| {
            items.iter().map(|f| f.title.clone()).collect::<Vec<_>>()
        };
        assert_eq!(
            titles(&groups.positive),
            vec!["Primary documents", "Corrections policy"]
        );
        assert_eq!(
            titles(&groups.negative),
            vec!["Anonymous sourcing", "Clickbait headline"]
        );
        assert_eq!(titles(&groups.neutral), vec!["Opinion section"]);
        assert_eq!(groups.len(), 5);
    }

    #[test]
    fn test_group_empty_input() {
        let groups = group_factors(&[]);
        assert!(groups.is_empty());
        assert!(groups.positive.is_empty());
        assert!(groups.sections(false).is_empty());
        assert_eq!(groups.sections(true).len(), 3);
    }

    #[test]
    fn test_sections_skip_empty_by_default() {
        let groups = group_factors(&[
            FactorItem::neutral("Recent Publication", "Still developing."),
            FactorItem::positive("Credible Source", "Reputable outlet."),
        ]);
        let sections = groups.sections(false);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Credibility Indicators");
        assert_eq!(sections[1].title, "Additional Context");
        assert_eq!(sections[1].factors[0].title, "Recent Publication");
    }

    #[test]
    fn test_sections_include_empty_on_request() {
        let groups = group_factors(&[FactorItem::negative("Loaded Language", "Charged wording.")]);
        let sections = groups.sections(true);
        let kinds: Vec<_> = sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![FactorKind::Positive, FactorKind::Negative, FactorKind::Neutral]
        );
        assert!(sections[0].is_empty());
        assert_eq!(sections[1].title, "Warning Signs");
    }
}
