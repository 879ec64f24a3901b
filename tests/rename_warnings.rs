mod common;

use std::{cell::RefCell, sync::Once};

use common::TestWorkspace;
use ksj_cleanup::{
    Language, YearRequest,
    metadata::MetadataStore,
    rename::{ColumnRenamer, DefaultRenameTable},
};
use log::{Level, LevelFilter, Log, Metadata, Record};

thread_local! {
    static CAPTURED: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Records crate log lines emitted on the calling thread.
struct CapturingLogger;

impl Log for CapturingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("ksj_cleanup")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            CAPTURED.with(|lines| {
                lines
                    .borrow_mut()
                    .push((record.level(), record.args().to_string()))
            });
        }
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger;
static INIT: Once = Once::new();

fn capture<T>(action: impl FnOnce() -> T) -> (T, Vec<(Level, String)>) {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("logger installed once");
        log::set_max_level(LevelFilter::Trace);
    });
    CAPTURED.with(|lines| lines.borrow_mut().clear());
    let result = action();
    let lines = CAPTURED.with(|lines| lines.take());
    (result, lines)
}

fn warnings(lines: &[(Level, String)]) -> Vec<&str> {
    lines
        .iter()
        .filter(|(level, _)| *level == Level::Warn)
        .map(|(_, message)| message.as_str())
        .collect()
}

#[test]
fn unknown_year_warns_with_column_id() {
    let ws = TestWorkspace::survey();
    let store = MetadataStore::scan(ws.path(), Language::Ja).unwrap();
    let defaults = DefaultRenameTable::new();
    let renamer = ColumnRenamer::new(&store, &defaults);

    let (name, lines) = capture(|| renamer.resolve_name("L03_007", YearRequest::Year(2014)));
    assert_eq!(name, "備考");
    let warned = warnings(&lines);
    assert_eq!(warned.len(), 1, "{lines:?}");
    assert!(warned[0].contains("L03_007"), "{}", warned[0]);
    assert!(warned[0].contains("2014"), "{}", warned[0]);
}

#[test]
fn known_year_and_unknown_column_do_not_warn() {
    let ws = TestWorkspace::survey();
    let store = MetadataStore::scan(ws.path(), Language::Ja).unwrap();
    let defaults = DefaultRenameTable::new();
    let renamer = ColumnRenamer::new(&store, &defaults);

    let (names, lines) = capture(|| {
        [
            renamer.resolve_name("L03_006", YearRequest::Year(2014)),
            renamer.resolve_name("L03_006", YearRequest::Latest),
            renamer.resolve_name("Z99_001", YearRequest::Year(2014)),
        ]
    });
    assert_eq!(names, ["土地利用種別", "土地利用区分", "Z99_001"]);
    assert!(warnings(&lines).is_empty(), "{lines:?}");
}
