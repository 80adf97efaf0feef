use std::ffi::OsString;

use beamsmith::data::Token;

const CLEAR: &str = "\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n\n";
const INPUT_DIR: &str = "./tests/input_files";

fn input_files() -> impl Iterator<Item = (OsString, String)> {
    std::fs::read_dir(INPUT_DIR)
        .expect("Should be able to access input directory")
        .map(|file| {
            let file_path = file
                .expect("Should be able to access files in input directory")
                .path();
            let input =
                std::fs::read_to_string(&file_path).expect("Should be able to read input files");
            (OsString::from(file_path.file_name().unwrap()), input)
        })
}

fn input_file(name: &str) -> String {
    std::fs::read_to_string(format!("{INPUT_DIR}/{name}")).expect("Should be able to read input file")
}

/// Prints input file's lex into the stdout, for inspection
#[ignore = "manual"]
#[test]
fn show_lex() {
    for (_, input) in input_files() {
        let parsed = match beamsmith::lex(input.as_str()) {
            Ok(ok) => ok,
            Err(err) => {
                panic!("Should successfully parse the input: {err:#?}");
            }
        };
        println!("{parsed:#?}");
        std::io::stdin()
            .read_line(&mut String::new())
            .expect("Should be able to read a line");
        println!("{}", CLEAR);
    }
}

#[test]
fn all_inputs_lex() {
    for (name, input) in input_files() {
        let document = beamsmith::lex(&input)
            .unwrap_or_else(|err| panic!("{name:?} should be lexed: {err}"));
        for frame in document.frames() {
            assert!(input[frame.span.clone()].starts_with("\\begin{frame}"));
            assert!(input[frame.span.clone()].ends_with("\\end{frame}"));
        }
    }
}

#[test]
fn cards() {
    // arrange
    let input = input_file("lesson_cards.tex");

    // act
    let document = beamsmith::lex(&input).expect("Should be able to lex");

    // assert
    let tokens = document
        .tokens
        .iter()
        .map(|token| match token {
            Token::Section(section) => format!("section {}", section.title),
            Token::Frame(frame) => format!("frame {}", frame.title.unwrap_or("-")),
        })
        .collect::<Vec<_>>();
    assert_eq!(
        tokens,
        vec![
            "frame -",
            "frame Learning Objectives",
            "section The four-party model",
            "frame Who is involved",
            "frame Fees",
            "section Settlement in code",
            "frame A settlement batch",
            "frame Summary",
        ],
        "Commented frames should not be there"
    );
    assert!(document.frames().next().unwrap().is_plain());
}

#[test]
fn overlays() {
    // arrange
    let input = input_file("lesson_overlays.tex");

    // act
    let document = beamsmith::lex(&input).expect("Should be able to lex");

    // assert
    let sections = document.sections().collect::<Vec<_>>();
    assert_eq!(sections.len(), 1, "\\sectionfont is not a section");
    assert!(sections[0].starred);
    let frames = document.frames().collect::<Vec<_>>();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0].overlay.as_ref().map(|o| o.value), Some("1-"));
    assert_eq!(frames[0].option_list(), vec!["t"]);
    assert_eq!(frames[0].title, Some("Money as a ledger"));
    assert!(frames[1].is_plain());
    assert!(frames[2].has_option("label"));
    assert_eq!(frames[2].title, Some(r"Escrow \{simplified\}"));
    assert_eq!(frames[3].title, None);
}
