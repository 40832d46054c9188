//! End-to-end scenarios for the virtualization triad: fold collapse over a
//! plain document, boundary-level visibility behavior, and viewport cache
//! reuse across scrolls.

mod common;

use common::{Fixture, RecordingClient};
use lineview_display::{DisplayView, VisibilityMap};

#[test]
fn collapsing_a_fold_shortens_the_scroll_range() {
    // 10 lines, all visible, one row each; lines 3..=6 form the body of the
    // fold starting at line 2.
    let fixture = Fixture::new(
        "zero\none\ntwo\n    three\n    four\n    five\n    six\nseven\neight\nnine",
        0,
    );
    let mut coordinator = fixture.coordinator();
    assert_eq!(coordinator.total_rows(), 10);

    assert!(coordinator.collapse_fold(2));
    assert_eq!(coordinator.total_rows(), 6);
    assert_eq!(coordinator.next_visible_line(2), Some(7));
    assert_eq!(coordinator.first_visible_line(), Some(0));
    assert_eq!(coordinator.last_visible_line(), Some(9));
    for hidden in 3..=6 {
        assert!(!coordinator.is_line_visible(hidden), "line {hidden}");
    }

    assert_eq!(coordinator.expand_fold(2, true), None);
    assert_eq!(coordinator.total_rows(), 10);
}

#[test]
fn boundary_vector_tracks_hides_and_inserts() {
    let mut map = VisibilityMap::new(10);
    assert_eq!(map.boundaries(), &[0, 10]);

    map.hide(3, 6);
    assert_eq!(map.boundaries(), &[0, 3, 7, 10]);
    assert!(!map.is_visible(5), "line 5 sits in the hidden run");
    assert_eq!(map.next(5), Some(7));
    assert_eq!(map.prev(5), Some(2));

    // Two lines inserted at line 8, inside the second visible run.
    map.content_inserted(8, 2);
    assert_eq!(map.boundaries(), &[0, 3, 7, 12]);
}

#[test]
fn scrolling_down_reuses_the_shifted_rows() {
    let lines: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
    let fixture = Fixture::new(&lines.join("\n"), 0);
    let client = RecordingClient::new(5);
    let mut view = DisplayView::new(
        fixture.shared_coordinator(),
        fixture.layout.clone(),
        client,
    );

    for row in 0..5 {
        assert_eq!(view.row(row).line, Some(row as u32));
    }
    assert_eq!(view.cache().valid_frontier(), 5);

    view.scroll_rows(2);
    assert_eq!(
        view.cache().valid_frontier(),
        3,
        "rows 2..=4 survive as rows 0..=2; only the exposed rows are stale"
    );
    assert_eq!(view.row(0).line, Some(2));
    assert_eq!(view.row(3).line, Some(5));
    assert_eq!(view.row(4).line, Some(6));
    assert_eq!(view.cache().valid_frontier(), 5);
}

#[test]
fn total_rows_matches_a_scan_after_every_operation() {
    let fixture = Fixture::new(
        "top\nheader one\n    aaaaaaaaaaaa\n    bbbb\nmiddle stretch\nheader two\n    cccccccc\n    dd\ntail line here\nlast",
        4,
    );
    let mut coordinator = fixture.coordinator();
    assert_eq!(coordinator.total_rows(), fixture.scan_total(&coordinator));

    coordinator.collapse_fold(1);
    assert_eq!(coordinator.total_rows(), fixture.scan_total(&coordinator));

    coordinator.collapse_fold(5);
    assert_eq!(coordinator.total_rows(), fixture.scan_total(&coordinator));

    coordinator.expand_fold(1, false);
    assert_eq!(coordinator.total_rows(), fixture.scan_total(&coordinator));

    coordinator.narrow(2, 8);
    assert_eq!(coordinator.total_rows(), fixture.scan_total(&coordinator));

    coordinator.expand_all_folds();
    assert_eq!(coordinator.total_rows(), fixture.scan_total(&coordinator));

    fixture.insert_lines(&mut coordinator, 4, &["wedged in", "    deep"]);
    assert_eq!(coordinator.total_rows(), fixture.scan_total(&coordinator));

    fixture.remove_lines(&mut coordinator, 2, 3);
    assert_eq!(coordinator.total_rows(), fixture.scan_total(&coordinator));

    fixture.edit_line(&mut coordinator, 1, "now much longer than it was before");
    assert_eq!(coordinator.total_rows(), fixture.scan_total(&coordinator));
}

#[test]
fn next_and_prev_invert_on_visible_lines() {
    let fixture = Fixture::new(
        "a\nb {\n    one\n    two\n}\nc {\n    three\n}\nd",
        0,
    );
    let mut coordinator = fixture.coordinator();
    coordinator.collapse_fold(1);
    coordinator.collapse_fold(5);
    for line in (0..9).filter(|&l| coordinator.is_line_visible(l)) {
        if let Some(prev) = coordinator.prev_visible_line(line) {
            assert_eq!(coordinator.next_visible_line(prev), Some(line));
        }
        if let Some(next) = coordinator.next_visible_line(line) {
            assert_eq!(coordinator.prev_visible_line(next), Some(line));
        }
    }
}

#[test]
fn set_top_row_agrees_with_a_full_scan() {
    let fixture = Fixture::new(
        "short\nheader {\n    wwwwwwwwwwwwwwww\n    xxxxxx\n}\nyyyyyyyyyyyy\nz",
        4,
    );
    let mut coordinator = fixture.coordinator();
    coordinator.collapse_fold(1);
    let visible: Vec<u32> = (0..7).filter(|&l| coordinator.is_line_visible(l)).collect();
    for &line in &visible {
        let row = fixture.scan_scroll_row(&coordinator, line);
        coordinator.set_top_row(row);
        assert_eq!(
            coordinator.top_line(),
            (line, 0),
            "row {row} must land on line {line}"
        );
        assert_eq!(coordinator.top_row(), row);
    }
}
