//! Integration tests for instance managers.
//!
//! Tests run-time scripting of repeating subforms:
//! - setCount, addInstance, insertInstance, removeInstance, moveInstance
//! - Occurrence bound and index checks
//! - Data tree kept in the same order as the Form run
//! - Change notifications

use xfa_forms::xfa::{
    name_hash, Element, FormEvent, InstanceManager, NodeId, RecordingNotify, XfaDocument, XfaParser,
};
use xfa_forms::{Error, OccurBound};

fn merged(occur: &str, rows: &[&str]) -> (XfaDocument, InstanceManager) {
    let data: String = rows
        .iter()
        .map(|qty| format!("<Row><qty>{}</qty></Row>", qty))
        .collect();
    let xdp = format!(
        r#"<xdp:xdp xmlns:xdp="http://ns.adobe.com/xdp/">
  <template>
    <subform name="form1">
      <field name="title"/>
      <subform name="Row">{}<field name="qty"/></subform>
    </subform>
  </template>
  <xfa:datasets xmlns:xfa="http://www.xfa.org/schema/xfa-data/1.0/">
    <xfa:data><form1 xfa:dataNode="dataGroup"><title>Orders</title>{}</form1></xfa:data>
  </xfa:datasets>
</xdp:xdp>"#,
        occur, data
    );
    let mut doc = XfaParser::new().parse(&xdp).expect("Failed to parse XDP");
    doc.do_data_merge().expect("Merge failed");
    let im = doc.instance_managers()[0];
    (doc, im)
}

/// Data rows under the record, in document order.
fn data_rows(doc: &XfaDocument) -> Vec<NodeId> {
    let record = doc.record().unwrap();
    doc.tree().children_by_name(record, name_hash("Row")).collect()
}

fn bound_rows(doc: &XfaDocument, im: &InstanceManager) -> Vec<NodeId> {
    im.instances(doc)
        .into_iter()
        .map(|row| doc.binding(row).expect("instance not bound"))
        .collect()
}

fn qty_values(doc: &XfaDocument, im: &InstanceManager) -> Vec<String> {
    im.instances(doc)
        .into_iter()
        .map(|row| {
            let qty = doc.tree().first_child_by_name(row, name_hash("qty")).unwrap();
            doc.value(qty).unwrap_or_default()
        })
        .collect()
}

#[test]
fn test_manager_lookup() {
    let (doc, im) = merged(r#"<occur min="0" max="-1"/>"#, &["1", "2"]);
    assert_eq!(im.name(&doc), "Row");
    assert_eq!(doc.tree().element(im.node()), Element::InstanceManager);
    assert_eq!(doc.instance_manager(im.node()).unwrap(), im);

    let second = im.instance(&doc, 1).unwrap();
    assert_eq!(doc.instance_manager_for(second), Some(im));
    assert!(im.instance(&doc, 2).is_none());

    // A non-repeating sibling field is not an instance.
    let top = doc.tree().parent(im.node()).unwrap();
    let title = doc.tree().first_child_by_name(top, name_hash("title")).unwrap();
    assert_eq!(doc.instance_manager_for(title), None);
    assert!(matches!(doc.instance_manager(title), Err(Error::NotInstanceManager(_))));
}

#[test]
fn test_set_count_grows_with_data() {
    let (mut doc, im) = merged(r#"<occur min="0" max="-1"/>"#, &["1"]);
    let recorder = RecordingNotify::new();
    doc.set_notify(Box::new(recorder.clone()));

    im.set_count(&mut doc, 3).unwrap();
    assert_eq!(im.count(&doc), 3);
    assert_eq!(bound_rows(&doc, &im), data_rows(&doc));

    let events = recorder.take();
    let ready = events
        .iter()
        .filter(|e| matches!(e, FormEvent::NodeReady(_)))
        .count();
    assert_eq!(ready, 2);
    assert_eq!(events.last(), Some(&FormEvent::LayoutInvalidated));
}

#[test]
fn test_set_count_shrinks_with_data() {
    let (mut doc, im) = merged(r#"<occur min="0" max="-1"/>"#, &["1", "2", "3"]);
    im.set_count(&mut doc, 1).unwrap();
    assert_eq!(qty_values(&doc, &im), vec!["1"]);
    assert_eq!(data_rows(&doc).len(), 1);

    im.set_count(&mut doc, 0).unwrap();
    assert_eq!(im.count(&doc), 0);
    assert!(data_rows(&doc).is_empty());

    // The unrelated title data survives.
    let record = doc.record().unwrap();
    assert!(doc.tree().first_child_by_name(record, name_hash("title")).is_some());
}

#[test]
fn test_set_count_respects_bounds() {
    let (mut doc, im) = merged(r#"<occur min="1" max="3"/>"#, &["1", "2"]);
    assert!(matches!(
        im.set_count(&mut doc, 0),
        Err(Error::BoundaryViolation { bound: OccurBound::Min(1), requested: 0 })
    ));
    assert!(matches!(
        im.set_count(&mut doc, 5),
        Err(Error::BoundaryViolation { bound: OccurBound::Max(3), requested: 5 })
    ));
    assert_eq!(im.count(&doc), 2);
    assert_eq!(data_rows(&doc).len(), 2);
}

#[test]
fn test_add_instance_at_max_fails() {
    let (mut doc, im) = merged(r#"<occur min="1" max="2"/>"#, &["1"]);
    im.add_instance(&mut doc, true).unwrap();
    let err = im.add_instance(&mut doc, true).unwrap_err();
    assert!(matches!(err, Error::BoundaryViolation { bound: OccurBound::Max(2), requested: 3 }));
    assert_eq!(im.count(&doc), 2);
}

#[test]
fn test_add_instance_without_data_merge_is_still_bound() {
    let (mut doc, im) = merged(r#"<occur min="0" max="-1"/>"#, &["1"]);
    let row = im.add_instance(&mut doc, false).unwrap();
    let data = doc.binding(row).unwrap();
    let rows = data_rows(&doc);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1], data);
}

#[test]
fn test_insert_instance_places_data_next_to_neighbour() {
    let (mut doc, im) = merged(r#"<occur min="0" max="-1"/>"#, &["a", "b", "c"]);
    let row = im.insert_instance(&mut doc, 1, true).unwrap();
    assert_eq!(im.instance(&doc, 1), Some(row));
    assert_eq!(im.count(&doc), 4);
    assert_eq!(bound_rows(&doc, &im), data_rows(&doc));
    assert_eq!(qty_values(&doc, &im), vec!["a", "", "b", "c"]);

    // Appending through insert keeps the new data last.
    let last = im.insert_instance(&mut doc, 4, true).unwrap();
    assert_eq!(im.instance(&doc, 4), Some(last));
    assert_eq!(bound_rows(&doc, &im), data_rows(&doc));
}

#[test]
fn test_insert_instance_out_of_range() {
    let (mut doc, im) = merged(r#"<occur min="0" max="-1"/>"#, &["a"]);
    assert!(matches!(
        im.insert_instance(&mut doc, 2, true),
        Err(Error::IndexOutOfBounds { index: 2, count: 1 })
    ));
    assert_eq!(im.count(&doc), 1);
}

#[test]
fn test_remove_instance() {
    let (mut doc, im) = merged(r#"<occur min="1" max="-1"/>"#, &["a", "b", "c"]);
    let removed = im.instance(&doc, 1).unwrap();
    let removed_data = doc.binding(removed).unwrap();

    im.remove_instance(&mut doc, 1).unwrap();
    assert_eq!(qty_values(&doc, &im), vec!["a", "c"]);
    assert_eq!(bound_rows(&doc, &im), data_rows(&doc));
    assert!(doc.tree().parent(removed_data).is_none());
    assert!(doc.disposed_nodes().contains(&removed));

    assert!(matches!(
        im.remove_instance(&mut doc, 2),
        Err(Error::IndexOutOfBounds { index: 2, count: 2 })
    ));
    im.remove_instance(&mut doc, 0).unwrap();
    assert!(matches!(
        im.remove_instance(&mut doc, 0),
        Err(Error::BoundaryViolation { bound: OccurBound::Min(1), requested: 0 })
    ));
    assert_eq!(qty_values(&doc, &im), vec!["c"]);
}

#[test]
fn test_move_instance_reorders_data() {
    let (mut doc, im) = merged(r#"<occur min="0" max="-1"/>"#, &["a", "b", "c", "d"]);
    let recorder = RecordingNotify::new();
    doc.set_notify(Box::new(recorder.clone()));

    im.move_instance(&mut doc, 3, 1).unwrap();
    assert_eq!(qty_values(&doc, &im), vec!["a", "d", "b", "c"]);
    assert_eq!(bound_rows(&doc, &im), data_rows(&doc));

    let moved = im.instance(&doc, 1).unwrap();
    let events = recorder.take();
    assert!(events.contains(&FormEvent::InstanceIndexChanged(moved, 1)));
    assert_eq!(events.last(), Some(&FormEvent::LayoutInvalidated));

    im.move_instance(&mut doc, 0, 3).unwrap();
    assert_eq!(qty_values(&doc, &im), vec!["d", "b", "c", "a"]);
    assert_eq!(bound_rows(&doc, &im), data_rows(&doc));
}

#[test]
fn test_move_instance_out_of_range() {
    let (mut doc, im) = merged(r#"<occur min="0" max="-1"/>"#, &["a", "b"]);
    assert!(matches!(
        im.move_instance(&mut doc, 2, 0),
        Err(Error::IndexOutOfBounds { index: 2, count: 2 })
    ));
    assert!(matches!(
        im.move_instance(&mut doc, 0, 2),
        Err(Error::IndexOutOfBounds { index: 2, count: 2 })
    ));
    im.move_instance(&mut doc, 1, 1).unwrap();
    assert_eq!(qty_values(&doc, &im), vec!["a", "b"]);
}

#[test]
fn test_occurrence_setters() {
    let (mut doc, im) = merged(r#"<occur min="1" max="4"/>"#, &["a", "b"]);
    im.set_max(&mut doc, 2).unwrap();
    assert!(im.add_instance(&mut doc, true).is_err());

    im.set_max(&mut doc, -1).unwrap();
    im.add_instance(&mut doc, true).unwrap();
    assert_eq!(im.count(&doc), 3);

    im.set_min(&mut doc, 3).unwrap();
    assert!(matches!(
        im.remove_instance(&mut doc, 0),
        Err(Error::BoundaryViolation { bound: OccurBound::Min(3), .. })
    ));

    // The template bounds are untouched.
    let template = doc.template_of(im.node()).unwrap();
    let occur = doc.tree().first_child_by_class(template, Element::Occur).unwrap();
    assert_eq!(doc.tree().attribute(occur, "max"), Some("4"));
}

#[test]
fn test_removed_global_data_is_not_reused() {
    let xdp = r#"<xdp:xdp xmlns:xdp="http://ns.adobe.com/xdp/">
  <template>
    <subform name="form1">
      <subform name="Row">
        <occur min="0" max="-1"/>
        <field name="total"><bind match="global"/></field>
      </subform>
    </subform>
  </template>
  <xfa:datasets xmlns:xfa="http://www.xfa.org/schema/xfa-data/1.0/">
    <xfa:data><form1><Row><total>5</total></Row></form1></xfa:data>
  </xfa:datasets>
</xdp:xdp>"#;
    let mut doc = XfaParser::new().parse(xdp).unwrap();
    doc.do_data_merge().unwrap();
    let im = doc.instance_managers()[0];
    let total_hash = name_hash("total");
    let old_total = doc.registry().lookup(total_hash).unwrap();

    im.remove_instance(&mut doc, 0).unwrap();
    assert!(doc.tree().parent(old_total).is_none());
    assert_eq!(doc.registry().lookup(total_hash), None);

    let row = im.add_instance(&mut doc, true).unwrap();
    let total = doc.tree().first_child_by_name(row, total_hash).unwrap();
    let data = doc.binding(total).unwrap();
    assert_ne!(data, old_total);
    let record = doc.record().unwrap();
    assert!(doc.tree().is_ancestor_or_self(record, data));
    assert_eq!(doc.registry().lookup(total_hash), Some(data));
}
