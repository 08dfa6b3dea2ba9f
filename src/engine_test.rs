#![allow(clippy::float_cmp)]

use super::*;
use crate::connector::ConnectorStyle;
use crate::input::{Button, InputState, Key, Modifiers, Tool, WheelDelta};
use crate::persistence::MemoryStore;
use crate::scene::Origin;

// =============================================================
// Helpers
// =============================================================

/// Core with an 800x600 window and identity transform.
fn core() -> EngineCore {
    let mut core = EngineCore::default();
    core.resize(800.0, 600.0);
    core
}

fn no_modifiers() -> Modifiers {
    Modifiers::default()
}

fn ctrl_modifier() -> Modifiers {
    Modifiers { ctrl: true, ..Default::default() }
}

fn shift_modifier() -> Modifiers {
    Modifiers { shift: true, ..Default::default() }
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn key(name: &str) -> Key {
    Key(name.to_owned())
}

fn add_rect(core: &mut EngineCore, x: f64, y: f64) -> ElementId {
    core.scene.add(Element::rectangle(pt(x, y), "#ff0000"))
}

/// Two rectangles 200 apart joined by a connector of `style`.
fn connected_pair(core: &mut EngineCore, style: ConnectorStyle) -> (ElementId, ElementId) {
    let a = add_rect(core, 100.0, 100.0);
    let b = add_rect(core, 300.0, 100.0);
    core.connectors.create(&mut core.scene, a, b, style).unwrap();
    (a, b)
}

fn has_action<F>(actions: &[Action], pred: F) -> bool
where
    F: Fn(&Action) -> bool,
{
    actions.iter().any(pred)
}

fn has_render_needed(actions: &[Action]) -> bool {
    has_action(actions, |a| matches!(a, Action::RenderNeeded))
}

fn has_history_scheduled(actions: &[Action]) -> bool {
    has_action(actions, |a| matches!(a, Action::ScheduleHistory { .. }))
}

fn interactive_count(core: &EngineCore) -> usize {
    core.scene.iter().filter(|e| e.interactive).count()
}

fn line_endpoints(core: &EngineCore) -> (Point, Point) {
    let connector = core.connectors.iter().next().unwrap();
    match &core.scene.get(&connector.line).unwrap().kind {
        ElementKind::Line { x1, y1, x2, y2, .. } => (pt(*x1, *y1), pt(*x2, *y2)),
        other => panic!("Expected line, got {other:?}"),
    }
}

// =============================================================
// Construction
// =============================================================

#[test]
fn new_core_is_empty_and_seeded() {
    let core = EngineCore::default();
    assert!(core.scene.is_empty());
    assert!(core.selection().is_empty());
    assert_eq!(core.ui.tool, Tool::Select);
    assert_eq!(core.history.len(), 1);
    assert!(!core.can_undo());
    assert!(!core.can_redo());
}

#[test]
fn connector_paint_comes_from_config() {
    let config = BoardConfig { connector_color: "#ff00ff".to_owned(), ..BoardConfig::default() };
    let mut core = EngineCore::new(config);
    connected_pair(&mut core, ConnectorStyle::Solid);
    let line = core.connectors.iter().next().unwrap().line;
    let stroke = core.scene.get(&line).unwrap().style.stroke.clone().unwrap();
    assert_eq!(stroke.color, "#ff00ff");
}

// =============================================================
// Adding elements
// =============================================================

#[test]
fn add_shape_lands_at_window_center_and_is_selected() {
    let mut core = core();
    let actions = core.execute(Command::AddShape(ShapeKind::Circle), 0.0);
    assert_eq!(core.scene.len(), 1);
    let element = &core.scene.elements()[0];
    assert_eq!(element.center(), pt(400.0, 300.0));
    assert_eq!(core.selection(), &Selection::Single(element.id));
    assert!(has_history_scheduled(&actions));
    assert!(has_render_needed(&actions));
    assert!(has_action(&actions, |a| matches!(a, Action::SelectionChanged(Some(_)))));
}

#[test]
fn add_shape_respects_pan_and_zoom() {
    let mut core = core();
    core.viewport.pan_by(-100.0, 0.0);
    core.viewport.zoom_at_point(2.0, pt(0.0, 0.0));
    core.execute(Command::AddShape(ShapeKind::Rectangle), 0.0);
    let center = core.scene.elements()[0].center();
    assert_eq!(center, core.viewport.screen_to_virtual(pt(400.0, 300.0)));
}

#[test]
fn add_shape_uses_current_color() {
    let mut core = core();
    core.execute(Command::SetColor("rgb(255, 0, 0)".to_owned()), 0.0);
    core.execute(Command::AddColorBlock, 0.0);
    assert_eq!(core.scene.elements()[0].style.fill.as_deref(), Some("#ff0000"));
}

#[test]
fn add_text_requests_editing() {
    let mut core = core();
    let actions = core.execute(Command::AddText, 0.0);
    let id = core.scene.elements()[0].id;
    match actions.last() {
        Some(Action::EditTextRequested { id: edit_id, text }) => {
            assert_eq!(*edit_id, id);
            assert_eq!(text, consts::DEFAULT_TEXT);
        }
        other => panic!("Expected EditTextRequested, got {other:?}"),
    }
}

#[test]
fn add_text_uses_font_defaults() {
    let mut core = core();
    core.execute(Command::ToggleBold, 0.0);
    core.execute(Command::SetFontFamily("Georgia".to_owned()), 0.0);
    core.execute(Command::AddText, 0.0);
    match &core.scene.elements()[0].kind {
        ElementKind::Text { font, .. } => {
            assert!(font.bold);
            assert_eq!(font.family, "Georgia");
        }
        other => panic!("Expected text, got {other:?}"),
    }
}

#[test]
fn add_image_is_scaled_to_fit() {
    let mut core = core();
    core.execute(Command::AddImage { src: "data:image/png;base64,".to_owned(), width: 600.0, height: 300.0 }, 0.0);
    let bounds = core.scene.elements()[0].bounds();
    assert_eq!(bounds.width, 300.0);
    assert_eq!(bounds.height, 150.0);
}

#[test]
fn add_template_selects_every_piece() {
    let mut core = core();
    core.execute(Command::AddTemplate(Template::Grid), 0.0);
    assert_eq!(core.scene.len(), 9);
    assert_eq!(core.selection().ids().len(), 9);
}

#[test]
fn set_text_updates_content_and_marks_dirty() {
    let mut core = core();
    core.execute(Command::AddText, 0.0);
    let id = core.scene.elements()[0].id;
    let actions = core.execute(Command::SetText { id, text: "Autumn".to_owned() }, 10.0);
    assert!(has_history_scheduled(&actions));
    match &core.scene.get(&id).unwrap().kind {
        ElementKind::Text { text, .. } => assert_eq!(text, "Autumn"),
        other => panic!("Expected text, got {other:?}"),
    }
}

// =============================================================
// Selection
// =============================================================

#[test]
fn selecting_connector_line_gives_no_selection() {
    let mut core = core();
    connected_pair(&mut core, ConnectorStyle::Solid);
    let line = core.connectors.iter().next().unwrap().line;
    core.execute(Command::Select(vec![line]), 0.0);
    assert!(core.selection().is_empty());
    assert!(core.properties().is_none());
}

#[test]
fn selecting_two_elements_forms_group() {
    let mut core = core();
    let a = add_rect(&mut core, 0.0, 0.0);
    let b = add_rect(&mut core, 200.0, 0.0);
    let actions = core.execute(Command::Select(vec![a, b]), 0.0);
    assert_eq!(core.selection(), &Selection::Group(vec![a, b]));
    match &actions[0] {
        Action::SelectionChanged(Some(view)) => assert_eq!(view.kind, "group"),
        other => panic!("Expected SelectionChanged, got {other:?}"),
    }
}

#[test]
fn cancel_drops_selection() {
    let mut core = core();
    let a = add_rect(&mut core, 0.0, 0.0);
    core.execute(Command::Select(vec![a]), 0.0);
    let actions = core.on_key_down(&key("Escape"), no_modifiers(), 0.0);
    assert!(core.selection().is_empty());
    assert!(has_action(&actions, |a| matches!(a, Action::SelectionChanged(None))));
}

// =============================================================
// Delete / clear
// =============================================================

#[test]
fn delete_cascades_to_connectors() {
    let mut core = core();
    let (a, b) = connected_pair(&mut core, ConnectorStyle::Arrow);
    assert_eq!(core.scene.len(), 4);
    core.execute(Command::Select(vec![a]), 0.0);
    let actions = core.execute(Command::Delete, 0.0);
    assert!(core.connectors.is_empty());
    assert_eq!(core.scene.len(), 1);
    assert!(core.scene.contains(&b));
    assert!(has_history_scheduled(&actions));
}

#[test]
fn delete_with_nothing_selected_is_noop() {
    let mut core = core();
    add_rect(&mut core, 0.0, 0.0);
    assert!(core.execute(Command::Delete, 0.0).is_empty());
    assert_eq!(core.scene.len(), 1);
}

#[test]
fn clear_removes_elements_and_connectors() {
    let mut core = core();
    connected_pair(&mut core, ConnectorStyle::Dashed);
    core.execute(Command::Clear, 0.0);
    assert!(core.scene.is_empty());
    assert!(core.connectors.is_empty());
}

// =============================================================
// Clipboard
// =============================================================

#[test]
fn duplicate_offsets_copies_and_carries_connectors() {
    let mut core = core();
    let (a, b) = connected_pair(&mut core, ConnectorStyle::Solid);
    core.execute(Command::Select(vec![a, b]), 0.0);
    core.execute(Command::Duplicate, 0.0);

    assert_eq!(interactive_count(&core), 4);
    assert_eq!(core.connectors.len(), 2);
    let copies = core.selection().ids();
    assert_eq!(copies.len(), 2);
    assert!(!copies.contains(&a) && !copies.contains(&b));
    assert_eq!(core.scene.center(&copies[0]), Some(pt(120.0, 120.0)));
    assert_eq!(core.scene.center(&copies[1]), Some(pt(320.0, 120.0)));
    let copy_connector = core.connectors.iter().last().unwrap();
    assert_eq!((copy_connector.from, copy_connector.to), (copies[0], copies[1]));
}

#[test]
fn duplicate_skips_connectors_leaving_the_selection() {
    let mut core = core();
    let (a, _) = connected_pair(&mut core, ConnectorStyle::Solid);
    core.execute(Command::Select(vec![a]), 0.0);
    core.execute(Command::Duplicate, 0.0);
    assert_eq!(core.connectors.len(), 1);
}

#[test]
fn repeated_paste_cascades() {
    let mut core = core();
    let a = add_rect(&mut core, 100.0, 100.0);
    core.execute(Command::Select(vec![a]), 0.0);
    core.execute(Command::Copy, 0.0);
    core.execute(Command::Paste, 0.0);
    core.execute(Command::Paste, 0.0);
    let pasted = core.selection().primary().unwrap();
    assert_eq!(core.scene.center(&pasted), Some(pt(140.0, 140.0)));
    assert_eq!(core.scene.len(), 3);
}

#[test]
fn paste_with_empty_clipboard_does_nothing() {
    let mut core = core();
    assert!(core.execute(Command::Paste, 0.0).is_empty());
    assert!(core.scene.is_empty());
}

// =============================================================
// Z-order
// =============================================================

#[test]
fn bring_to_front_and_send_to_back() {
    let mut core = core();
    let a = add_rect(&mut core, 0.0, 0.0);
    let b = add_rect(&mut core, 0.0, 0.0);
    core.execute(Command::Select(vec![a]), 0.0);
    core.execute(Command::BringToFront, 0.0);
    assert_eq!(core.scene.index_of(&a), Some(1));
    core.execute(Command::SendToBack, 0.0);
    assert_eq!(core.scene.index_of(&a), Some(0));
    assert_eq!(core.scene.index_of(&b), Some(1));
}

#[test]
fn reorder_at_limit_is_not_a_mutation() {
    let mut core = core();
    let a = add_rect(&mut core, 0.0, 0.0);
    core.execute(Command::Select(vec![a]), 0.0);
    assert!(core.execute(Command::BringForward, 0.0).is_empty());
}

// =============================================================
// History
// =============================================================

#[test]
fn history_records_after_quiet_period() {
    let mut core = core();
    core.execute(Command::AddShape(ShapeKind::Rectangle), 0.0);
    assert!(core.tick(499.0).is_empty());
    let actions = core.tick(500.0);
    assert_eq!(actions, vec![Action::HistoryChanged { can_undo: true, can_redo: false }]);
    assert_eq!(core.history.len(), 2);
}

#[test]
fn mutations_inside_quiet_period_coalesce() {
    let mut core = core();
    core.execute(Command::AddShape(ShapeKind::Rectangle), 0.0);
    core.execute(Command::AddShape(ShapeKind::Circle), 400.0);
    assert!(core.tick(600.0).is_empty());
    core.tick(900.0);
    assert_eq!(core.history.len(), 2);
}

#[test]
fn undo_redo_round_trip() {
    let mut core = core();
    core.execute(Command::AddShape(ShapeKind::Rectangle), 0.0);
    core.tick(500.0);
    let before = core.scene.clone();

    let actions = core.execute(Command::Undo, 1000.0);
    assert!(core.scene.is_empty());
    assert!(has_action(&actions, |a| matches!(a, Action::HistoryChanged { can_undo: false, can_redo: true })));

    core.execute(Command::Redo, 1100.0);
    assert_eq!(core.scene, before);
    assert!(!core.can_redo());
}

#[test]
fn undoing_every_step_replays_each_serialized_board() {
    let mut core = core();
    let (a, b) = connected_pair(&mut core, ConnectorStyle::Arrow);
    core.record_snapshot();
    let mut boards = vec![core.snapshot_text().unwrap()];

    core.execute(Command::AddShape(ShapeKind::Circle), 0.0);
    core.tick(500.0);
    boards.push(core.snapshot_text().unwrap());

    core.execute(Command::Select(vec![b]), 1000.0);
    core.execute(Command::Edit(PropertyEdit::Scale { x: 2.0, y: 2.0 }), 1000.0);
    core.tick(1500.0);
    boards.push(core.snapshot_text().unwrap());

    core.execute(Command::Select(vec![a]), 2000.0);
    core.execute(Command::Delete, 2000.0);
    core.tick(2500.0);
    assert!(core.connectors.is_empty());
    boards.push(core.snapshot_text().unwrap());

    let mut now = 3000.0;
    for (step, expected) in boards.iter().rev().skip(1).enumerate() {
        now += 100.0;
        core.execute(Command::Undo, now);
        assert_eq!(&core.snapshot_text().unwrap(), expected, "after undo {}", step + 1);
    }
    assert_eq!(core.connectors.len(), 1);
    // Position 0 is the empty board the core was seeded with.
    assert_eq!(core.history.cursor(), 1);

    for (step, expected) in boards.iter().skip(1).enumerate() {
        now += 100.0;
        core.execute(Command::Redo, now);
        assert_eq!(&core.snapshot_text().unwrap(), expected, "after redo {}", step + 1);
    }
    assert!(!core.can_redo());
}

#[test]
fn load_does_not_create_history_entry() {
    let mut core = core();
    core.execute(Command::AddShape(ShapeKind::Rectangle), 0.0);
    core.tick(500.0);
    let actions = core.execute(Command::Undo, 1000.0);
    assert!(!has_history_scheduled(&actions));
    assert!(!core.history.is_pending());
    assert_eq!(core.history.len(), 2);
}

#[test]
fn undo_flushes_pending_edit_first() {
    let mut core = core();
    core.execute(Command::AddShape(ShapeKind::Rectangle), 0.0);
    core.execute(Command::Undo, 100.0);
    assert!(core.scene.is_empty());
    assert!(core.can_redo());
}

#[test]
fn undo_restores_connectors() {
    let mut core = core();
    let (a, _) = connected_pair(&mut core, ConnectorStyle::Arrow);
    core.record_snapshot();
    core.execute(Command::Select(vec![a]), 0.0);
    core.execute(Command::Delete, 0.0);
    core.tick(500.0);
    assert!(core.connectors.is_empty());

    core.execute(Command::Undo, 1000.0);
    assert_eq!(core.connectors.len(), 1);
    assert_eq!(core.scene.len(), 4);
    assert_eq!(interactive_count(&core), 2);
}

#[test]
fn corrupt_snapshot_leaves_board_and_cursor() {
    let mut core = core();
    core.history.record("{broken".to_owned());
    add_rect(&mut core, 0.0, 0.0);
    core.record_snapshot();
    let cursor = core.history.cursor();
    let before = core.scene.clone();

    let actions = core.execute(Command::Undo, 0.0);
    assert!(actions.is_empty());
    assert_eq!(core.history.cursor(), cursor);
    assert_eq!(core.scene, before);
}

#[test]
fn edit_after_undo_discards_redo_tail() {
    let mut core = core();
    core.execute(Command::AddShape(ShapeKind::Rectangle), 0.0);
    core.tick(500.0);
    core.execute(Command::AddShape(ShapeKind::Circle), 1000.0);
    core.tick(1500.0);
    core.execute(Command::Undo, 2000.0);
    core.execute(Command::AddShape(ShapeKind::Triangle), 3000.0);
    core.tick(3500.0);
    assert_eq!(core.history.len(), 3);
    assert_eq!(core.history.cursor(), 2);
    assert!(!core.can_redo());
}

// =============================================================
// Pointer: pan and drag
// =============================================================

#[test]
fn drag_on_empty_canvas_pans() {
    let mut core = core();
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary, no_modifiers(), 0.0);
    let actions = core.on_pointer_move(pt(150.0, 70.0));
    assert_eq!((core.viewport.offset_x, core.viewport.offset_y), (50.0, -30.0));
    assert_eq!(core.viewport.scale, 1.0);
    assert!(has_action(&actions, |a| matches!(a, Action::ViewportChanged { zoom_percent: 100 })));
    assert!(core.on_pointer_up(10.0).is_empty());
}

#[test]
fn middle_button_pans_even_over_elements() {
    let mut core = core();
    add_rect(&mut core, 100.0, 100.0);
    core.on_pointer_down(pt(100.0, 100.0), Button::Middle, no_modifiers(), 0.0);
    assert!(matches!(core.input, InputState::Panning { .. }));
}

#[test]
fn drag_moves_element_and_connector_follows() {
    let mut core = core();
    let (a, _) = connected_pair(&mut core, ConnectorStyle::Arrow);
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary, no_modifiers(), 0.0);
    assert_eq!(core.selection(), &Selection::Single(a));
    core.on_pointer_move(pt(150.0, 130.0));

    assert_eq!(core.scene.center(&a), Some(pt(150.0, 130.0)));
    let (start, end) = line_endpoints(&core);
    assert_eq!(start, pt(150.0, 130.0));
    assert_eq!(end, pt(300.0, 100.0));
    let head = core.connectors.iter().next().unwrap().arrowhead.unwrap();
    let expected = crate::connector::arrowhead_rotation(start, end);
    assert_eq!(core.scene.get(&head).unwrap().pose.rotation, expected);

    let actions = core.on_pointer_up(200.0);
    assert!(has_history_scheduled(&actions));
}

#[test]
fn drag_converts_screen_delta_through_zoom() {
    let mut core = core();
    let a = add_rect(&mut core, 100.0, 100.0);
    core.viewport.zoom_at_point(2.0, pt(0.0, 0.0));
    core.on_pointer_down(pt(200.0, 200.0), Button::Primary, no_modifiers(), 0.0);
    core.on_pointer_move(pt(240.0, 200.0));
    assert_eq!(core.scene.center(&a), Some(pt(120.0, 100.0)));
}

#[test]
fn click_without_move_is_not_a_mutation() {
    let mut core = core();
    add_rect(&mut core, 100.0, 100.0);
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary, no_modifiers(), 0.0);
    assert!(core.on_pointer_up(5.0).is_empty());
    assert!(!core.history.is_pending());
}

#[test]
fn group_drag_moves_every_member() {
    let mut core = core();
    let a = add_rect(&mut core, 100.0, 100.0);
    let b = add_rect(&mut core, 300.0, 100.0);
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary, no_modifiers(), 0.0);
    core.on_pointer_up(0.0);
    core.on_pointer_down(pt(300.0, 100.0), Button::Primary, shift_modifier(), 0.0);
    assert_eq!(core.selection(), &Selection::Group(vec![a, b]));
    core.on_pointer_move(pt(300.0, 150.0));
    assert_eq!(core.scene.center(&a), Some(pt(100.0, 150.0)));
    assert_eq!(core.scene.center(&b), Some(pt(300.0, 150.0)));
}

#[test]
fn shift_click_on_member_removes_it() {
    let mut core = core();
    let a = add_rect(&mut core, 100.0, 100.0);
    let b = add_rect(&mut core, 300.0, 100.0);
    core.execute(Command::Select(vec![a, b]), 0.0);
    core.on_pointer_down(pt(300.0, 100.0), Button::Primary, shift_modifier(), 0.0);
    assert_eq!(core.selection(), &Selection::Single(a));
    assert!(matches!(core.input, InputState::Idle));
}

#[test]
fn click_on_empty_canvas_clears_selection() {
    let mut core = core();
    let a = add_rect(&mut core, 100.0, 100.0);
    core.execute(Command::Select(vec![a]), 0.0);
    let actions = core.on_pointer_down(pt(600.0, 500.0), Button::Primary, no_modifiers(), 0.0);
    assert!(core.selection().is_empty());
    assert!(has_action(&actions, |a| matches!(a, Action::SelectionChanged(None))));
}

#[test]
fn double_click_on_text_requests_edit() {
    let mut core = core();
    core.execute(Command::AddText, 0.0);
    let actions = core.on_double_click(pt(400.0, 300.0));
    assert!(has_action(&actions, |a| matches!(a, Action::EditTextRequested { .. })));
    assert!(core.on_double_click(pt(10.0, 10.0)).is_empty());
}

// =============================================================
// Connection mode
// =============================================================

#[test]
fn connection_mode_picks_two_endpoints() {
    let mut core = core();
    let a = add_rect(&mut core, 100.0, 100.0);
    let b = add_rect(&mut core, 300.0, 100.0);
    core.execute(Command::StartConnection(ConnectorStyle::Arrow), 0.0);
    assert_eq!(core.ui.tool, Tool::Connect(ConnectorStyle::Arrow));

    let actions = core.on_pointer_down(pt(100.0, 100.0), Button::Primary, no_modifiers(), 0.0);
    assert!(has_action(&actions, |x| *x == Action::ConnectionPending { source: Some(a) }));

    core.on_pointer_move(pt(200.0, 200.0));
    assert_eq!(core.ui.connect_preview, Some(pt(200.0, 200.0)));

    let actions = core.on_pointer_down(pt(300.0, 100.0), Button::Primary, no_modifiers(), 10.0);
    assert!(has_history_scheduled(&actions));
    let connector = core.connectors.iter().next().unwrap();
    assert_eq!((connector.from, connector.to), (a, b));
    assert!(connector.arrowhead.is_some());
    assert_eq!(core.ui.tool, Tool::Select);
    assert_eq!(core.ui.pending_source, None);
}

#[test]
fn connection_mode_starts_from_selected_element() {
    let mut core = core();
    let a = add_rect(&mut core, 100.0, 100.0);
    core.execute(Command::Select(vec![a]), 0.0);
    let actions = core.execute(Command::StartConnection(ConnectorStyle::Solid), 0.0);
    assert!(has_action(&actions, |x| *x == Action::ConnectionPending { source: Some(a) }));
}

#[test]
fn connecting_element_to_itself_is_ignored() {
    let mut core = core();
    add_rect(&mut core, 100.0, 100.0);
    core.execute(Command::StartConnection(ConnectorStyle::Solid), 0.0);
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary, no_modifiers(), 0.0);
    assert!(core.on_pointer_down(pt(100.0, 100.0), Button::Primary, no_modifiers(), 0.0).is_empty());
    assert!(core.connectors.is_empty());
    assert!(core.ui.tool.is_connect());
}

#[test]
fn escape_leaves_connection_mode() {
    let mut core = core();
    add_rect(&mut core, 100.0, 100.0);
    core.execute(Command::StartConnection(ConnectorStyle::Dotted), 0.0);
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary, no_modifiers(), 0.0);
    core.on_key_down(&key("Escape"), no_modifiers(), 0.0);
    assert_eq!(core.ui.tool, Tool::Select);
    assert_eq!(core.ui.pending_source, None);
    assert_eq!(core.ui.connect_preview, None);
}

// =============================================================
// Properties
// =============================================================

#[test]
fn scale_edit_moves_connector_endpoints() {
    let mut core = core();
    let a = add_rect(&mut core, 100.0, 100.0);
    let mut corner = Element::rectangle(pt(300.0, 100.0), "#00ff00");
    corner.pose.origin = Origin::TopLeft;
    let b = core.scene.add(corner);
    core.connectors.create(&mut core.scene, a, b, ConnectorStyle::Solid).unwrap();
    assert_eq!(line_endpoints(&core).1, pt(350.0, 150.0));

    core.execute(Command::Select(vec![b]), 0.0);
    let actions = core.execute(Command::Edit(PropertyEdit::Scale { x: 2.0, y: 2.0 }), 0.0);
    assert_eq!(line_endpoints(&core).1, pt(400.0, 200.0));
    assert!(has_history_scheduled(&actions));
}

#[test]
fn edit_without_selection_is_noop() {
    let mut core = core();
    add_rect(&mut core, 0.0, 0.0);
    assert!(core.execute(Command::Edit(PropertyEdit::Opacity(0.5)), 0.0).is_empty());
}

#[test]
fn group_edit_applies_to_every_member() {
    let mut core = core();
    let a = add_rect(&mut core, 0.0, 0.0);
    let b = add_rect(&mut core, 200.0, 0.0);
    core.execute(Command::Select(vec![a, b]), 0.0);
    core.execute(Command::Edit(PropertyEdit::Opacity(0.25)), 0.0);
    assert_eq!(core.scene.get(&a).unwrap().style.opacity, 0.25);
    assert_eq!(core.scene.get(&b).unwrap().style.opacity, 0.25);
}

#[test]
fn swatch_fills_selected_shape() {
    let mut core = core();
    let a = add_rect(&mut core, 0.0, 0.0);
    core.execute(Command::Select(vec![a]), 0.0);
    core.execute(Command::ApplySwatch("#2ecc71".to_owned()), 0.0);
    assert_eq!(core.scene.get(&a).unwrap().style.fill.as_deref(), Some("#2ecc71"));
    assert_eq!(core.ui.defaults.color, consts::DEFAULT_COLOR);
}

#[test]
fn fill_edit_reaches_selected_image() {
    let mut core = core();
    core.execute(Command::AddImage { src: "data:,".to_owned(), width: 100.0, height: 50.0 }, 0.0);
    assert_eq!(core.properties().unwrap().fill.as_deref(), Some("#ffffff"));

    let actions = core.execute(Command::Edit(PropertyEdit::Fill("#00ff00".to_owned())), 0.0);
    assert!(has_render_needed(&actions));
    assert_eq!(core.scene.elements()[0].style.fill.as_deref(), Some("#00ff00"));
    assert_eq!(core.properties().unwrap().fill.as_deref(), Some("#00ff00"));
}

#[test]
fn swatch_fills_selected_image() {
    let mut core = core();
    core.execute(Command::AddImage { src: "data:,".to_owned(), width: 100.0, height: 50.0 }, 0.0);
    let actions = core.execute(Command::ApplySwatch("#123456".to_owned()), 0.0);
    assert!(has_render_needed(&actions));
    assert_eq!(core.scene.elements()[0].style.fill.as_deref(), Some("#123456"));
    assert_eq!(core.ui.defaults.color, consts::DEFAULT_COLOR);
}

#[test]
fn swatch_without_shape_sets_current_color() {
    let mut core = core();
    core.execute(Command::AddText, 0.0);
    let actions = core.execute(Command::ApplySwatch("rgb(46, 204, 113)".to_owned()), 0.0);
    assert_eq!(actions, vec![Action::DefaultsChanged]);
    assert_eq!(core.ui.defaults.color, "#2ecc71");
}

#[test]
fn add_swatch_rejects_duplicates() {
    let mut core = core();
    assert_eq!(core.execute(Command::AddSwatch("#abc".to_owned()), 0.0), vec![Action::DefaultsChanged]);
    assert!(core.ui.defaults.swatches.contains(&"#aabbcc".to_owned()));
    let actions = core.execute(Command::AddSwatch("#AABBCC".to_owned()), 0.0);
    assert!(has_action(&actions, |a| matches!(a, Action::Notify(_))));
}

#[test]
fn toggle_bold_updates_selected_text() {
    let mut core = core();
    core.execute(Command::AddText, 0.0);
    let actions = core.execute(Command::ToggleBold, 0.0);
    assert!(core.ui.defaults.font.bold);
    assert!(has_action(&actions, |a| matches!(a, Action::DefaultsChanged)));
    match &core.scene.elements()[0].kind {
        ElementKind::Text { font, .. } => assert!(font.bold),
        other => panic!("Expected text, got {other:?}"),
    }
}

// =============================================================
// Viewport
// =============================================================

#[test]
fn wheel_zoom_keeps_anchor_fixed() {
    let mut core = core();
    let anchor = pt(200.0, 100.0);
    let before = core.viewport.screen_to_virtual(anchor);
    let actions = core.on_wheel(anchor, WheelDelta { dx: 0.0, dy: -100.0 }, no_modifiers());
    assert!(has_render_needed(&actions));
    assert!((core.viewport.scale - 1.1).abs() < 1e-12);
    let after = core.viewport.screen_to_virtual(anchor);
    assert!((after.x - before.x).abs() < 1e-9);
    assert!((after.y - before.y).abs() < 1e-9);
}

#[test]
fn wheel_zoom_at_limit_is_noop() {
    let mut core = core();
    core.viewport.scale = core.viewport.max_scale;
    let offset = (core.viewport.offset_x, core.viewport.offset_y);
    let actions = core.on_wheel(pt(10.0, 10.0), WheelDelta { dx: 0.0, dy: -1.0 }, no_modifiers());
    assert!(actions.is_empty());
    assert_eq!((core.viewport.offset_x, core.viewport.offset_y), offset);
}

#[test]
fn horizontal_wheel_pans() {
    let mut core = core();
    core.on_wheel(pt(0.0, 0.0), WheelDelta { dx: 30.0, dy: 10.0 }, no_modifiers());
    assert_eq!((core.viewport.offset_x, core.viewport.offset_y), (-30.0, -10.0));
    assert_eq!(core.viewport.scale, 1.0);
}

#[test]
fn ctrl_wheel_always_zooms() {
    let mut core = core();
    core.on_wheel(pt(0.0, 0.0), WheelDelta { dx: 30.0, dy: 10.0 }, ctrl_modifier());
    assert!((core.viewport.scale - 1.0 / 1.1).abs() < 1e-12);
}

#[test]
fn zoom_buttons_anchor_at_window_center() {
    let mut core = core();
    let center = core.viewport.screen_to_virtual(pt(400.0, 300.0));
    core.execute(Command::ZoomIn, 0.0);
    core.execute(Command::ZoomIn, 0.0);
    core.execute(Command::ZoomOut, 0.0);
    assert!((core.viewport.scale - 1.1).abs() < 1e-12);
    let after = core.viewport.screen_to_virtual(pt(400.0, 300.0));
    assert!((after.x - center.x).abs() < 1e-9);
}

#[test]
fn reset_view_centers_canvas() {
    let mut core = core();
    core.viewport.zoom_at_point(3.0, pt(10.0, 10.0));
    core.execute(Command::ResetView, 0.0);
    assert_eq!(core.viewport.scale, 1.0);
    assert_eq!((core.viewport.offset_x, core.viewport.offset_y), (-1100.0, -700.0));
}

#[test]
fn opening_view_centers_canvas_in_window() {
    let mut core = EngineCore::default();
    let actions = core.open_view(800.0, 600.0);
    assert!(has_action(&actions, |a| matches!(a, Action::ViewportChanged { zoom_percent: 100 })));
    assert_eq!((core.viewport.offset_x, core.viewport.offset_y), (-1100.0, -700.0));
    let center = core.viewport.screen_to_virtual(pt(400.0, 300.0));
    assert_eq!((center.x, center.y), (1500.0, 1000.0));
}

#[test]
fn resize_keeps_transform() {
    let mut core = core();
    core.viewport.pan_by(10.0, 20.0);
    let actions = core.resize(1024.0, 768.0);
    assert!(has_action(&actions, |a| matches!(a, Action::ViewportChanged { .. })));
    assert_eq!((core.viewport.offset_x, core.viewport.offset_y), (10.0, 20.0));
    assert_eq!(core.viewport.window_width, 1024.0);
}

#[test]
fn minimap_click_recenters_viewport() {
    let mut core = core();
    // 200x150 minimap over 3000x2000 gives scale 1/15.
    core.minimap_click(pt(100.0, 60.0));
    let center = core.viewport.screen_to_virtual(pt(400.0, 300.0));
    assert!((center.x - 1500.0).abs() < 1e-9);
    assert!((center.y - 900.0).abs() < 1e-9);
}

#[test]
fn minimap_view_tracks_visible_rect() {
    let core = core();
    let view = core.minimap_view();
    assert_eq!(view.viewport, core.viewport.visible_rect().scaled(view.scale));
}

#[test]
fn toggle_grid_flips_flag() {
    let mut core = core();
    assert!(!core.ui.show_grid);
    core.execute(Command::ToggleGrid, 0.0);
    assert!(core.ui.show_grid);
}

// =============================================================
// Keyboard
// =============================================================

#[test]
fn ctrl_z_undoes() {
    let mut core = core();
    core.execute(Command::AddShape(ShapeKind::Rectangle), 0.0);
    core.tick(500.0);
    core.on_key_down(&key("z"), ctrl_modifier(), 1000.0);
    assert!(core.scene.is_empty());
    let redo = Modifiers { shift: true, ..ctrl_modifier() };
    core.on_key_down(&key("Z"), redo, 1100.0);
    assert_eq!(core.scene.len(), 1);
}

#[test]
fn delete_key_removes_selection() {
    let mut core = core();
    core.execute(Command::AddShape(ShapeKind::Rectangle), 0.0);
    core.on_key_down(&key("Backspace"), no_modifiers(), 0.0);
    assert!(core.scene.is_empty());
}

#[test]
fn ctrl_s_requests_save() {
    let mut core = core();
    assert_eq!(core.on_key_down(&key("s"), ctrl_modifier(), 0.0), vec![Action::SaveRequested]);
}

#[test]
fn plain_letters_are_ignored() {
    let mut core = core();
    assert!(core.on_key_down(&key("s"), no_modifiers(), 0.0).is_empty());
}

// =============================================================
// Context menu
// =============================================================

#[test]
fn context_menu_on_element() {
    let mut core = core();
    let a = add_rect(&mut core, 100.0, 100.0);
    let menu = core.context_menu(pt(100.0, 100.0));
    assert_eq!(menu.target, Some(a));
    assert!(menu.items.iter().any(|i| i.command == Command::Delete));
    assert!(menu.items.iter().any(|i| i.command == Command::StartConnection(ConnectorStyle::Arrow)));
}

#[test]
fn context_menu_on_empty_canvas() {
    let core = core();
    let menu = core.context_menu(pt(100.0, 100.0));
    assert_eq!(menu.target, None);
    let paste = menu.items.iter().find(|i| i.command == Command::Paste).unwrap();
    assert!(!paste.enabled);
    assert!(menu.items.iter().any(|i| i.command == Command::ResetView));
}

// =============================================================
// Persistence / export
// =============================================================

#[test]
fn save_and_load_round_trip() {
    let mut core = core();
    connected_pair(&mut core, ConnectorStyle::Arrow);
    let mut store = MemoryStore::new();
    core.save(&mut store).unwrap();

    let mut restored = EngineCore::default();
    assert!(restored.load(&store).unwrap());
    assert_eq!(interactive_count(&restored), 2);
    assert_eq!(restored.connectors.len(), 1);
    assert_eq!(restored.scene.len(), 4);
    assert_eq!(restored.history.len(), 1);
    assert!(!restored.can_undo());
}

#[test]
fn load_with_nothing_saved_keeps_board() {
    let mut core = core();
    add_rect(&mut core, 0.0, 0.0);
    assert!(!core.load(&MemoryStore::new()).unwrap());
    assert_eq!(core.scene.len(), 1);
}

#[test]
fn quota_failure_leaves_board_intact() {
    let mut core = core();
    connected_pair(&mut core, ConnectorStyle::Solid);
    let before = core.scene.clone();
    let mut store = MemoryStore::with_quota(10);
    let err = core.save(&mut store).unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded { .. }));
    assert_eq!(core.scene, before);
    assert_eq!(core.connectors.len(), 1);
}

#[test]
fn export_selection_uses_selected_bounds() {
    let mut core = core();
    let a = add_rect(&mut core, 100.0, 100.0);
    core.execute(Command::Select(vec![a]), 0.0);
    let request = ExportRequest { area: crate::export::ExportArea::Selection, ..ExportRequest::default() };
    let plan = core.export_plan(&request).unwrap();
    assert_eq!((plan.pixel_width, plan.pixel_height), (100, 100));
}

#[test]
fn shape_names_parse() {
    assert_eq!("rect".parse::<ShapeKind>(), Ok(ShapeKind::Rectangle));
    assert_eq!("polygon".parse::<ShapeKind>(), Ok(ShapeKind::Pentagon));
    assert!("hexagon".parse::<ShapeKind>().is_err());
}

#[test]
fn command_names_resolve_with_arguments() {
    assert_eq!(Command::from_name("add-shape", Some("circle")), Ok(Command::AddShape(ShapeKind::Circle)));
    assert_eq!(Command::from_name("template", Some("collage")), Ok(Command::AddTemplate(Template::Collage)));
    assert_eq!(Command::from_name("connect", None), Ok(Command::StartConnection(ConnectorStyle::Solid)));
    assert_eq!(Command::from_name("connect", Some("arrow")), Ok(Command::StartConnection(ConnectorStyle::Arrow)));
    assert_eq!(Command::from_name("font-size", Some("32")), Ok(Command::SetFontSize(32.0)));
    assert_eq!(Command::from_name("undo", None), Ok(Command::Undo));
}

#[test]
fn command_names_reject_bad_input() {
    assert!(Command::from_name("add-shape", None).is_err());
    assert!(Command::from_name("font-size", Some("large")).is_err());
    assert!(Command::from_name("teleport", None).is_err());
}

#[test]
fn only_clear_asks_for_confirmation() {
    assert!(Command::Clear.confirmation().is_some());
    assert_eq!(Command::Delete.confirmation(), None);
    assert_eq!(Command::from_name("save", None).map(|c| c.confirmation()), Ok(None));
}
