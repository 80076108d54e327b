use std::io::{self, BufRead, Write};

use crate::ast::TypeSpecifier;
use crate::error::{EvalResult, RuntimeError};
use crate::value::Value;

/// Functions provided by the interpreter itself. They are resolved before
/// user functions and their names cannot be redefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Input,
    ToInt,
    ToFloat,
    ToString,
    ToBool,
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::Print,
        Builtin::Input,
        Builtin::ToInt,
        Builtin::ToFloat,
        Builtin::ToString,
        Builtin::ToBool,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Input => "input",
            Builtin::ToInt => "to_int",
            Builtin::ToFloat => "to_float",
            Builtin::ToString => "to_string",
            Builtin::ToBool => "to_bool",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Input => 0,
            _ => 1,
        }
    }

    pub fn call(self, mut args: Vec<Value>, console: &mut Console) -> EvalResult<Value> {
        if args.len() != self.arity() {
            return Err(self.wrong_arity(args.len()));
        }

        match (self, args.pop()) {
            (Builtin::Input, _) => console.read_line().map(Value::Str),
            (Builtin::Print, Some(Value::Str(text))) => {
                console.print_line(&text)?;
                Ok(Value::Str(text))
            }
            (Builtin::Print, Some(other)) => Err(RuntimeError::MismatchedTypes {
                name: self.name().to_string(),
                expected: TypeSpecifier::String,
                found: other.type_specifier(),
            }),
            (Builtin::ToInt, Some(value)) => to_int(value),
            (Builtin::ToFloat, Some(value)) => to_float(value),
            (Builtin::ToString, Some(value)) => Ok(to_string(value)),
            (Builtin::ToBool, Some(value)) => to_bool(value),
            (_, None) => Err(self.wrong_arity(0)),
        }
    }

    fn wrong_arity(self, found: usize) -> RuntimeError {
        RuntimeError::WrongParameterCount {
            function: self.name().to_string(),
            expected: self.arity(),
            found,
        }
    }
}

fn unsupported(function: Builtin, value: &Value) -> RuntimeError {
    RuntimeError::UnsupportedArgumentType {
        function: function.name().to_string(),
        found: value.type_specifier(),
    }
}

fn to_int(value: Value) -> EvalResult<Value> {
    match value {
        Value::Int(_) => Ok(value),
        // Halves round up, out of range values saturate.
        Value::Float(v) => Ok(Value::Int((v + 0.5).floor() as i32)),
        Value::Bool(v) => Ok(Value::Int(i32::from(v))),
        Value::Str(text) => text
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|_| RuntimeError::InvalidConversion {
                function: Builtin::ToInt.name().to_string(),
                value: text,
            }),
    }
}

fn to_float(value: Value) -> EvalResult<Value> {
    match value {
        Value::Int(v) => Ok(Value::Float(v as f32)),
        Value::Float(_) => Ok(value),
        other => Err(unsupported(Builtin::ToFloat, &other)),
    }
}

fn to_string(value: Value) -> Value {
    match value {
        Value::Str(_) => value,
        other => Value::Str(other.to_string()),
    }
}

fn to_bool(value: Value) -> EvalResult<Value> {
    match value {
        Value::Int(v) => Ok(Value::Bool(v != 0)),
        Value::Bool(_) => Ok(value),
        Value::Str(text) => Ok(Value::Bool(text.eq_ignore_ascii_case("true"))),
        other => Err(unsupported(Builtin::ToBool, &other)),
    }
}

/// The program's view of the outside world: `print` writes to stdout and,
/// when capturing, to an in-memory buffer as well; `input` reads lines from
/// a configurable source.
pub struct Console {
    input: Box<dyn BufRead>,
    captured: Option<String>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            input: Box::new(io::BufReader::new(io::stdin())),
            captured: None,
        }
    }

    pub fn with_input(mut self, input: impl BufRead + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    pub fn with_capture(mut self) -> Self {
        self.captured = Some(String::new());
        self
    }

    /// Everything printed so far, one line per `print` call. `None` unless
    /// capture was enabled.
    pub fn captured(&self) -> Option<&str> {
        self.captured.as_deref()
    }

    pub fn print_line(&mut self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", text)?;
        stdout.flush()?;

        if let Some(buffer) = &mut self.captured {
            buffer.push_str(text);
            buffer.push('\n');
        }
        Ok(())
    }

    pub fn read_line(&mut self) -> EvalResult<String> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no more input lines").into());
        }

        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(line)
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
