use std::path::{Path, PathBuf};

use beamsmith::{
    audit::{Auditor, Severity},
    config::AuditConfig,
    edit::{self, AddFrameOption, AddSectionDividers, ChartFilter, Edit, NormalizeChartWidths},
    layout::{CourseLayout, DefaultEngine, PathEngine},
    pages, BeamerLesson, FrameSpec, LessonSpec, SectionSpec,
};

const INPUT_DIR: &str = "./tests/input_files";

/// A one-module course with the cards lesson and one of its two figures
fn course() -> (tempfile::TempDir, PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let module = root.path().join("module_01_payments");
    std::fs::create_dir_all(module.join("figures")).unwrap();
    let lesson = module.join("lesson_01_cards.tex");
    std::fs::copy(Path::new(INPUT_DIR).join("lesson_cards.tex"), &lesson).unwrap();
    std::fs::write(module.join("figures/four_party.pdf"), "%PDF-1.4").unwrap();
    (root, lesson)
}

#[test]
fn lessons_are_discovered() {
    // arrange
    let (root, lesson) = course();
    std::fs::write(lesson.with_file_name("notes.tex"), "").unwrap();
    let layout = CourseLayout::new(root.path());

    // act
    let lessons = layout.select_lessons(None, &[]).expect("Should list lessons");

    // assert
    assert_eq!(lessons, vec![lesson]);
}

#[test]
fn figures_resolve_through_module() {
    // arrange
    let (root, lesson) = course();
    let layout = CourseLayout::new(root.path());
    let engine = DefaultEngine::new(&layout);

    // act
    let bare = engine.graphic(&lesson, "four_party");
    let missing = engine.graphic(&lesson, "figures/card_fees.pdf");

    // assert
    assert_eq!(
        bare.expect("Should be found in module figures"),
        root.path().join("module_01_payments/figures/four_party.pdf")
    );
    assert!(missing.expect_err("Should not be found").attempts.len() >= 3);
}

#[test]
fn audit_flags_missing_figure() {
    // arrange
    let (root, lesson) = course();
    let layout = CourseLayout::new(root.path());
    let engine = DefaultEngine::new(&layout);
    let auditor = Auditor::from_config(&AuditConfig::default(), &engine);

    // act
    let report = auditor.audit_files(&[lesson]);

    // assert
    let audit = &report.files[0];
    assert_eq!(audit.frames, 6);
    assert_eq!(audit.sections, 2);
    let unresolved = audit
        .findings
        .iter()
        .filter(|finding| finding.code == "AU-007")
        .collect::<Vec<_>>();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].severity, Severity::Error);
    assert!(unresolved[0].message.contains("card_fees.pdf"));
    assert!(
        audit.findings.iter().all(|finding| finding.code != "AU-006"),
        "Both required frames are there"
    );
}

#[test]
fn edits_written_unless_dry_run() {
    // arrange
    let (_root, lesson) = course();
    let original = std::fs::read_to_string(&lesson).unwrap();
    let widths = NormalizeChartWidths::new(0.7, ChartFilter::Charts).unwrap();
    let edits: [&dyn Edit; 2] = [&widths, &AddSectionDividers::default()];

    // act
    let dry = edit::edit_files([lesson.as_path()], &edits, true);
    let after_dry = std::fs::read_to_string(&lesson).unwrap();
    let wet = edit::edit_files([lesson.as_path()], &edits, false);
    let again = edit::edit_files([lesson.as_path()], &edits, false);

    // assert
    assert_eq!(dry.total_changes(), 4);
    assert!(!dry.files[0].written);
    assert_eq!(after_dry, original);
    assert!(wet.files[0].written);
    assert_eq!(again.total_changes(), 0);
    assert!(!again.files[0].written);
    assert!(std::fs::read_to_string(&lesson).unwrap().contains("width=0.7\\textwidth"));
}

#[test]
fn missing_files_do_not_stop_edits() {
    // arrange
    let (root, lesson) = course();
    let absent = root.path().join("absent.tex");
    let fragile = AddFrameOption::fragile();

    // act
    let summary = edit::edit_files([absent.as_path(), lesson.as_path()], &[&fragile], false);

    // assert
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.files.len(), 1);
    assert_eq!(summary.total_changes(), 1);
}

#[test]
fn generated_lesson_needs_no_edits() {
    // arrange
    let lesson = LessonSpec {
        title: "Card Payments".into(),
        objectives: vec!["Describe the four-party model".into()],
        sections: vec![SectionSpec {
            title: "The four-party model".into(),
            frames: vec![FrameSpec {
                title: "Fees".into(),
                chart: Some("figures/card_fees.pdf".into()),
                note: Some("Interchange flows to the issuer".into()),
                ..Default::default()
            }],
        }],
        summary: vec!["Four parties".into()],
        ..Default::default()
    };
    let tex = BeamerLesson::default().generate(&lesson).expect("Should generate");
    let widths = NormalizeChartWidths::new(0.8, ChartFilter::Charts).unwrap();
    let edits: [&dyn Edit; 3] = [&AddFrameOption::fragile(), &widths, &AddSectionDividers::default()];

    // act
    let document = beamsmith::lex(&tex).expect("Generated lesson should lex");
    let changes = edits
        .iter()
        .map(|edit| edit.apply(&tex).expect("Should apply").changes)
        .collect::<Vec<_>>();

    // assert
    // title page, objectives, divider, fees, summary
    assert_eq!(document.frames().count(), 5);
    assert_eq!(changes, vec![0, 0, 0]);
}

#[test]
fn pages_after_compile() {
    // arrange
    let (root, lesson) = course();
    std::fs::write(lesson.with_extension("pdf"), "%PDF-1.4 deck").unwrap();
    let layout = CourseLayout::new(root.path());

    // act
    let report = pages::organize(&layout, Some(1)).expect("Should organize");

    // assert
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].title.as_deref(), Some("Card Payments"));
    assert_eq!(report.entries[0].href, "module_01/lesson_01_cards.pdf");
    let index = std::fs::read_to_string(report.index).unwrap();
    assert!(index.contains("## Module 01: Payments"));
    assert!(index.contains("- [Card Payments](module_01/lesson_01_cards.pdf)"));
}
