//! Effective order computation
//!
//! Pure functions over the two lanes. The effective order is never edited in
//! place; every mutation rebuilds it from `(manual, context, anchor)`.

use lsq_common::{CatalogId, QueueItem};
use uuid::Uuid;

/// Merge the lanes around the anchor
///
/// Anchor found at `k` in context: `context[..=k] ++ manual ++ context[k+1..]`.
/// No anchor, or anchor absent from context: `manual ++ context`.
pub fn build_effective(
    manual: &[QueueItem],
    context: &[QueueItem],
    anchor: Option<CatalogId>,
) -> Vec<QueueItem> {
    let split = anchor.and_then(|anchor| context.iter().position(|item| item.catalog_id == anchor));

    let mut effective = Vec::with_capacity(manual.len() + context.len());
    match split {
        Some(k) => {
            effective.extend_from_slice(&context[..=k]);
            effective.extend_from_slice(manual);
            effective.extend_from_slice(&context[k + 1..]);
        }
        None => {
            effective.extend_from_slice(manual);
            effective.extend_from_slice(context);
        }
    }
    effective
}

/// Current index after a rebuild
///
/// Priority: loaded instance identity, then last known catalog id, then 0.
pub fn locate_current(
    effective: &[QueueItem],
    instance_id: Option<Uuid>,
    catalog_id: Option<CatalogId>,
) -> usize {
    instance_id
        .and_then(|id| effective.iter().position(|item| item.instance_id == id))
        .or_else(|| catalog_id.and_then(|id| effective.iter().position(|item| item.catalog_id == id)))
        .unwrap_or(0)
}

/// Inputs for choosing where a full reconciliation leaves the player
#[derive(Debug, Clone, Default)]
pub struct TargetHints {
    pub index_override: Option<usize>,
    pub anchor_override: Option<CatalogId>,
    pub previous_instance: Option<Uuid>,
    pub previous_catalog: Option<CatalogId>,
}

/// How the target index was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    IndexOverride,
    AnchorOverride,
    PreviousInstance,
    PreviousCatalog,
    Fallback,
}

impl TargetSource {
    /// True when the target is the item that was already playing
    pub fn keeps_previous(&self) -> bool {
        matches!(self, TargetSource::PreviousInstance | TargetSource::PreviousCatalog)
    }
}

/// Target slot for a full reconciliation
///
/// Priority: index override (clamped to the last slot), anchor override,
/// previous instance identity, previous catalog id, 0.
pub fn select_target(effective: &[QueueItem], hints: &TargetHints) -> (usize, TargetSource) {
    let last = effective.len().saturating_sub(1);

    if let Some(index) = hints.index_override {
        return (index.min(last), TargetSource::IndexOverride);
    }
    if let Some(index) = hints
        .anchor_override
        .and_then(|anchor| effective.iter().position(|item| item.catalog_id == anchor))
    {
        return (index, TargetSource::AnchorOverride);
    }
    if let Some(index) = hints
        .previous_instance
        .and_then(|id| effective.iter().position(|item| item.instance_id == id))
    {
        return (index, TargetSource::PreviousInstance);
    }
    if let Some(index) = hints
        .previous_catalog
        .and_then(|id| effective.iter().position(|item| item.catalog_id == id))
    {
        return (index, TargetSource::PreviousCatalog);
    }
    (0, TargetSource::Fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsq_common::PlayableRef;

    fn item(catalog_id: CatalogId, manual_entry_id: Option<i64>) -> QueueItem {
        QueueItem::new(
            catalog_id,
            PlayableRef {
                media_id: catalog_id.to_string(),
                url: format!("https://cdn.example/{}.mp3", catalog_id),
                title: None,
                artist: None,
                duration_ms: None,
            },
            manual_entry_id,
        )
    }

    fn ids(items: &[QueueItem]) -> Vec<CatalogId> {
        items.iter().map(|i| i.catalog_id).collect()
    }

    #[test]
    fn test_manual_spliced_after_anchor() {
        let manual = vec![item(1, Some(1)), item(2, Some(2))];
        let context = vec![item(10, None), item(20, None), item(30, None)];

        let effective = build_effective(&manual, &context, Some(10));
        assert_eq!(ids(&effective), vec![10, 1, 2, 20, 30]);

        let effective = build_effective(&manual, &context, Some(30));
        assert_eq!(ids(&effective), vec![10, 20, 30, 1, 2]);
    }

    #[test]
    fn test_missing_anchor_puts_manual_first() {
        let manual = vec![item(2, Some(1))];
        let context = vec![item(10, None), item(20, None)];

        assert_eq!(ids(&build_effective(&manual, &context, None)), vec![2, 10, 20]);
        assert_eq!(ids(&build_effective(&manual, &context, Some(99))), vec![2, 10, 20]);
    }

    #[test]
    fn test_anchor_uses_first_context_match() {
        let manual = vec![item(5, Some(1))];
        let context = vec![item(10, None), item(20, None), item(10, None)];

        assert_eq!(ids(&build_effective(&manual, &context, Some(10))), vec![10, 5, 20, 10]);
    }

    #[test]
    fn test_locate_current_prefers_instance_identity() {
        let context = vec![item(10, None), item(20, None)];
        let duplicate = item(10, Some(1));
        let effective = build_effective(&[duplicate.clone()], &context, Some(10));

        // catalog 10 appears twice; identity picks the manual copy
        assert_eq!(locate_current(&effective, Some(duplicate.instance_id), Some(10)), 1);
        assert_eq!(locate_current(&effective, Some(Uuid::new_v4()), Some(20)), 2);
        assert_eq!(locate_current(&effective, None, None), 0);
        assert_eq!(locate_current(&[], Some(duplicate.instance_id), Some(10)), 0);
    }

    #[test]
    fn test_select_target_priority() {
        let effective = vec![item(10, None), item(20, None), item(30, None)];
        let previous = effective[2].instance_id;

        let hints = TargetHints {
            index_override: Some(7),
            anchor_override: Some(20),
            previous_instance: Some(previous),
            previous_catalog: Some(10),
        };
        assert_eq!(select_target(&effective, &hints), (2, TargetSource::IndexOverride));

        let hints = TargetHints { index_override: None, ..hints };
        assert_eq!(select_target(&effective, &hints), (1, TargetSource::AnchorOverride));

        let hints = TargetHints { anchor_override: Some(99), ..hints };
        assert_eq!(select_target(&effective, &hints), (2, TargetSource::PreviousInstance));

        let hints = TargetHints { previous_instance: None, ..hints };
        assert_eq!(select_target(&effective, &hints), (0, TargetSource::PreviousCatalog));

        assert_eq!(
            select_target(&effective, &TargetHints::default()),
            (0, TargetSource::Fallback)
        );
        assert_eq!(
            select_target(&[], &TargetHints { index_override: Some(3), ..Default::default() }),
            (0, TargetSource::IndexOverride)
        );
    }
}
