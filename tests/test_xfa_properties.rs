//! Property-based tests for occurrence bounds and instance managers
//!
//! Tests cardinality invariants of the merge and of run-time instance
//! scripting using proptest to generate bounds, data sizes and move
//! sequences.

use proptest::prelude::*;
use xfa_forms::xfa::{name_hash, InstanceManager, NodeId, Occurrence, XfaDocument, XfaParser};

/// Merge `form1 > Row{occur} > qty` against `rows` data rows.
fn merged(min: i32, max: i32, rows: usize) -> (XfaDocument, InstanceManager) {
    let data: String = (0..rows)
        .map(|i| format!("<Row><qty>{}</qty></Row>", i))
        .collect();
    let xdp = format!(
        r#"<xdp:xdp xmlns:xdp="http://ns.adobe.com/xdp/">
  <template>
    <subform name="form1">
      <subform name="Row"><occur min="{}" max="{}"/><field name="qty"/></subform>
    </subform>
  </template>
  <xfa:datasets xmlns:xfa="http://www.xfa.org/schema/xfa-data/1.0/">
    <xfa:data><form1 xfa:dataNode="dataGroup">{}</form1></xfa:data>
  </xfa:datasets>
</xdp:xdp>"#,
        min, max, data
    );
    let mut doc = XfaParser::new().parse(&xdp).unwrap();
    doc.do_data_merge().unwrap();
    let im = doc.instance_managers()[0];
    (doc, im)
}

fn data_rows(doc: &XfaDocument) -> Vec<NodeId> {
    let record = doc.record().unwrap();
    doc.tree().children_by_name(record, name_hash("Row")).collect()
}

fn bound_rows(doc: &XfaDocument, im: &InstanceManager) -> Vec<Option<NodeId>> {
    im.instances(doc).into_iter().map(|row| doc.binding(row)).collect()
}

fn raw_bound() -> impl Strategy<Value = Option<i32>> {
    prop_oneof![Just(None), (-3i32..12).prop_map(Some)]
}

// Bounded maxima are never 0 here: max 0 suppresses the container entirely.
fn max_strategy() -> impl Strategy<Value = i32> {
    prop_oneof![Just(-1i32), 1i32..6]
}

proptest! {
    #[test]
    fn prop_occurrence_is_normalized(min in raw_bound(), max in raw_bound(), initial in raw_bound()) {
        let occur = Occurrence::from_raw(min, max, initial);
        prop_assert!(occur.min <= occur.initial);
        if let Some(max) = occur.max_count() {
            prop_assert!(occur.min <= max);
            prop_assert!(occur.initial <= max);
        } else {
            prop_assert_eq!(occur.max, -1);
        }
        if max == Some(0) {
            prop_assert_eq!(occur, Occurrence { min: 0, max: 0, initial: 0 });
        }
    }

    #[test]
    fn prop_merge_cardinality(min in 0i32..4, max in max_strategy(), rows in 0usize..7) {
        let occur = Occurrence::from_raw(Some(min), Some(max), None);
        let (doc, im) = merged(min, max, rows);

        let driven = occur.max_count().map_or(rows, |max| rows.min(max));
        let expected = if driven == 0 { occur.initial } else { driven.max(occur.min) };
        prop_assert_eq!(im.count(&doc), expected);
        prop_assert!(occur.contains(im.count(&doc)));

        // Data-driven instances bind the data rows in order.
        let rows_in_data = data_rows(&doc);
        let bound = bound_rows(&doc, &im);
        for (i, data) in bound.iter().take(driven).enumerate() {
            prop_assert_eq!(*data, Some(rows_in_data[i]));
        }
    }

    #[test]
    fn prop_set_count_keeps_trees_in_step(rows in 0usize..5, target in 0usize..7) {
        let (mut doc, im) = merged(0, -1, rows);
        im.set_count(&mut doc, target).unwrap();
        prop_assert_eq!(im.count(&doc), target);

        let expected: Vec<Option<NodeId>> = data_rows(&doc).into_iter().map(Some).collect();
        prop_assert_eq!(bound_rows(&doc, &im), expected);
    }

    #[test]
    fn prop_moves_keep_data_order(
        rows in 2usize..6,
        moves in prop::collection::vec((0usize..6, 0usize..6), 1..8)
    ) {
        let (mut doc, im) = merged(0, -1, rows);
        for (from, to) in moves {
            im.move_instance(&mut doc, from % rows, to % rows).unwrap();
            let expected: Vec<Option<NodeId>> = data_rows(&doc).into_iter().map(Some).collect();
            prop_assert_eq!(bound_rows(&doc, &im), expected);
        }
        prop_assert_eq!(im.count(&doc), rows);
    }

    #[test]
    fn prop_out_of_range_leaves_run_unchanged(rows in 1usize..5, index in 5usize..10) {
        let (mut doc, im) = merged(0, -1, rows);
        let before = im.instances(&doc);
        prop_assert!(im.insert_instance(&mut doc, index, true).is_err());
        prop_assert!(im.remove_instance(&mut doc, index).is_err());
        prop_assert!(im.move_instance(&mut doc, index, 0).is_err());
        prop_assert_eq!(im.instances(&doc), before);
    }
}
