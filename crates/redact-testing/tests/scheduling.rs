use std::cell::RefCell;
use std::rc::Rc;

use redact_core::{
    use_state, Component, Effect, Element, Props, RootOptions, Setter, SurfaceCall, WorkStatus,
};
use redact_testing::{RenderTestRule, ScriptedDeadline};

fn rows(count: usize) -> Element {
    Element::host("table").children_from(
        (0..count).map(|row| Element::host("tr").child(Element::host("td").child(row))),
    )
}

#[test]
fn slices_respect_the_deadline_and_resume_in_place() {
    let mut rule = RenderTestRule::new();
    rule.install(rows(3));

    // root, table, then three rows of tr, td and text.
    let mut slices = 0;
    let summary = loop {
        slices += 1;
        match rule.step(&ScriptedDeadline::units(4)).expect("slice") {
            WorkStatus::Yielded => {
                assert!(rule.calls().is_empty());
                let work = rule.root().work_in_progress().expect("pass in progress");
                assert_eq!(work.units_performed(), slices * 4);
            }
            WorkStatus::Committed(summary) => break summary,
            WorkStatus::Idle => panic!("pass vanished"),
        }
    };

    assert_eq!(slices, 3);
    assert_eq!(summary.placements, 10);
    assert_eq!(rule.text(), "012");
    assert_eq!(rule.callback_requests(), 3, "one for render and one per yield");
}

#[test]
fn shrinking_lists_report_pending_deletions_before_commit() {
    let mut rule = RenderTestRule::new();
    rule.set_content(rows(4)).expect("mount");
    let removed: Vec<_> = rule.find("tr").into_iter().skip(1).collect();
    rule.take_calls();

    rule.install(rows(1));
    assert_eq!(rule.step(&ScriptedDeadline::units(2)), Ok(WorkStatus::Yielded));
    let root = rule.root();
    assert_eq!(root.pending_deletions().len(), 3);
    let current = root.current().expect("committed tree");
    for &deleted in root.pending_deletions() {
        assert_eq!(current[deleted].kind().label(), "tr");
    }
    let work = root.work_in_progress().expect("pass in progress");
    let table = work.tree()[work.tree().root()].children()[0];
    assert_eq!(work.tree()[table].effect(), Effect::Update);

    rule.pump_until_idle().expect("commit");
    let table = rule.find("table")[0];
    let expected: Vec<_> = removed
        .into_iter()
        .map(|child| SurfaceCall::Remove {
            parent: table,
            child,
        })
        .collect();
    assert_eq!(rule.take_calls(), expected);
    assert_eq!(rule.text(), "0");
}

#[test]
fn state_updates_during_a_slow_pass_restart_it() {
    let slot: Rc<RefCell<Option<Setter<String>>>> = Rc::new(RefCell::new(None));
    let label = {
        let slot = Rc::clone(&slot);
        Component::new("Label", move |_: &Props| {
            let (text, set_text) = use_state(String::from("draft"));
            slot.borrow_mut().replace(set_text);
            Element::host("label").child(text)
        })
    };
    let mut rule = RenderTestRule::with_options(RootOptions::default().with_max_units_per_slice(2));
    rule.set_content(Element::host("form").child(Element::component(&label)))
        .expect("mount");

    let set_text = slot.borrow().clone().expect("rendered");
    set_text.set("saved".into());
    assert_eq!(rule.step(&ScriptedDeadline::units(8)), Ok(WorkStatus::Yielded));
    set_text.update(|text| format!("{text}!"));
    assert_eq!(rule.text(), "draft");

    rule.pump_until_idle().expect("restarted pass");
    assert_eq!(rule.text(), "saved!");
    assert!(!rule.runtime_handle().has_pending_update());
}
