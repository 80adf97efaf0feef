use pyo3::prelude::*;
use rand::random;

static MODULE_NAME: &str = "beamsmith_charts";

/// Proof that the chart module was loaded into the interpreter
#[derive(Debug)]
pub struct InitToken(String);

impl InitToken {
    fn new() -> Self {
        InitToken(format!("{}_{}", MODULE_NAME, random::<u32>()))
    }

    fn module_name(&self) -> &str {
        &self.0
    }

    fn module<'py>(&self, py: Python<'py>) -> Result<&'py PyModule, PyErr> {
        PyModule::import(py, self.module_name())
    }
}

pub fn init(code: &str) -> Result<InitToken, PyErr> {
    Python::with_gil(move |py| {
        let token = InitToken::new();
        PyModule::from_code(py, code, "charts.py", token.module_name())?;
        Ok(token)
    })
}

pub fn append_function(target: &mut String, name: &str, code: &str) {
    target.push_str(format!("\n\ndef {name}():").as_str());
    let mut empty = true;
    for line in code.lines() {
        empty &= line.trim().is_empty();
        target.push_str(format!("\n    {line}").as_str())
    }
    if empty {
        target.push_str("\n    pass");
    }
    target.push('\n');
}

/// Calls a no-argument function of the module, discarding its result
pub fn call_function(token: &InitToken, name: &str) -> Result<(), PyErr> {
    Python::with_gil(|py| {
        let function = token.module(py)?.getattr(name)?;
        function.call0()?;
        Ok(())
    })
}

/// A python string literal
pub fn literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::{call_function, init, literal};

    macro_rules! init_functions {
        ($code:expr, [$(($fun_name:expr, $fun_code:expr)), *]) => {{
            let mut code = $code.to_string();
            for (fun_name, fun_code) in [$(($fun_name, $fun_code)), *] {
                super::append_function(&mut code, fun_name, fun_code);
            }
            init(code.as_str())
        }};
    }

    #[test]
    fn create_empty_should_ok() {
        // arrange
        let code = "";

        // act + assert
        let _token = init_functions!(code, []).expect("Should be able to create empty module");
    }

    #[test]
    fn create_invalid_should_err() {
        // arrange
        let code = "x = 5;\ny = **5;";

        // act + assert
        let _err = init_functions!(code, []).expect_err("Should deny bad code");
    }

    #[test]
    fn function_absent_should_err() {
        // arrange
        let token = init_functions!("x = 5", []).expect("Should be able to create module");

        // act + assert
        call_function(&token, "absent_function")
            .expect_err("Should get error for non-existent function call");
    }

    #[test]
    fn raising_function_should_err() {
        // arrange
        let token = init_functions!("x = 5", [("fails", "raise ValueError('no data')"), ("works", "return x")])
            .expect("Should be able to create module");

        // act
        let failed = call_function(&token, "fails");
        let worked = call_function(&token, "works");

        // assert
        assert!(failed.is_err());
        assert!(worked.is_ok(), "One failure should not poison the module");
    }

    #[test]
    fn empty_function_body() {
        // arrange
        let token = init_functions!("", [("nothing", "")]).expect("Should be able to create module");

        // act + assert
        call_function(&token, "nothing").expect("Should be callable");
    }

    #[test]
    fn literals() {
        assert_eq!(literal("plain"), "\"plain\"");
        assert_eq!(literal("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(literal("C:\\dir\nnext"), "\"C:\\\\dir\\nnext\"");
    }
}
