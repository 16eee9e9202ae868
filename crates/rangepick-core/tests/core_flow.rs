use std::cell::RefCell;
use std::rc::Rc;

use chrono::{Datelike, Month, NaiveDate, Weekday};
use rangepick_core::presets::PresetCatalog;
use rangepick_core::session::{Session, parse_script};
use rangepick_core::{ClickOutcome, Direction, RangeChange, RangeSelector, generate};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[test]
fn scripted_selection_reports_ranges_to_observer() {
    let seen = Rc::new(RefCell::new(Vec::<String>::new()));
    let sink = Rc::clone(&seen);

    let mut selector = RangeSelector::new(date(2024, 3, 1));
    selector.on_change(move |change: &RangeChange| {
        sink.borrow_mut().push(change.to_json_line().expect("json"));
    });
    let mut session = Session::new(selector, PresetCatalog::default());

    let script = "open\nclick 8\nclick 5\nclick 11\nclick 18\nnext\nclick 2\nclear\ndone\n";
    for action in parse_script(script).expect("parse script") {
        session.apply(&action).expect("apply action");
    }

    assert_eq!(
        seen.borrow().as_slice(),
        &[
            r#"[["2024-03-08","2024-03-11"],["2024-03-09","2024-03-10"]]"#.to_string(),
            r#"[["2024-03-18","2024-04-02"],["2024-03-23","2024-03-24","2024-03-30","2024-03-31"]]"#.to_string(),
        ]
    );

    let state = session.selector().state();
    assert_eq!(state.start, None);
    assert_eq!(state.end, None);
    assert!(!state.is_open);
    assert_eq!((state.view_year, state.view_month), (2024, Month::April));
}

#[test]
fn weekends_match_calendar_for_long_ranges() {
    let start = date(2024, 1, 2);
    let end = date(2024, 12, 30);
    let change = RangeChange::new(start, end);

    let expected: Vec<NaiveDate> = start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .collect();

    assert_eq!(change.weekends, expected);
    assert!(change.weekends.windows(2).all(|pair| pair[0] < pair[1]));
    // 52 Saturdays and 52 Sundays; Dec 28/29 is the last pair.
    assert_eq!(change.weekends.len(), 104);
}

#[test]
fn navigation_never_touches_selection() {
    let mut selector = RangeSelector::new(date(2024, 11, 1));
    assert!(matches!(selector.click_day(4), ClickOutcome::Started { .. }));

    for _ in 0..14 {
        selector.change_month(Direction::Next);
    }
    assert_eq!(selector.state().view_year, 2026);
    assert_eq!(selector.state().view_month, Month::January);
    assert_eq!(selector.state().start, Some(date(2024, 11, 4)));

    let grid = selector.grid();
    assert_eq!(grid, generate(2026, Month::January));
    // 2026-01-01 is a Thursday.
    assert_eq!(grid.cell_at(0, 4).map(|cell| cell.day), Some(1));
}
