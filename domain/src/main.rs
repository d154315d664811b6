use std::env;
use std::process;

use domain::sanitize::sanitize;
use domain::submission::FieldValue;
use domain::validate::{self, FieldLimits};

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  domain sanitize <text>\n  domain check <field> <value>\n\nFields:\n  date, time, price, link, kids, email, name, description, organization, location\n\nNotes:\n  - Values are read as text; `kids` therefore only accepts a literal true/false here.",
        domain::about()
    );
}

/// Interpret a command-line value the way a JSON payload would carry it.
fn cli_value(field: &str, raw: &str) -> FieldValue {
    match (field, raw) {
        ("kids", "true") => FieldValue::Bool(true),
        ("kids", "false") => FieldValue::Bool(false),
        _ => FieldValue::Text(raw.to_string()),
    }
}

fn check(field: &str, raw: &str) -> Result<bool, String> {
    let limits = FieldLimits::default();
    let value = cli_value(field, raw);
    let ok = match field {
        "date" => validate::valid_date(raw),
        "time" => validate::valid_time(raw),
        "price" => validate::valid_integer(&value),
        "link" => validate::valid_url(&value),
        "kids" => validate::valid_boolean(&value),
        "email" => validate::valid_email(&value),
        "name" | "description" | "organization" | "location" => {
            let max = match field {
                "name" => limits.name,
                "description" => limits.description,
                "organization" => limits.organization,
                _ => limits.location,
            };
            sanitize(raw).is_some_and(|text| validate::valid_bounded_string(text.as_str(), max))
        }
        other => return Err(format!("unknown field: {}", other)),
    };
    Ok(ok)
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    match cmd.as_str() {
        "sanitize" => {
            let Some(text) = args.next() else {
                return Err("missing <text> for sanitize".into());
            };
            match sanitize(text.as_str()) {
                Some(clean) => println!("{}", clean),
                None => println!("<none>"),
            }
            Ok(())
        }
        "check" => {
            let (Some(field), Some(value)) = (args.next(), args.next()) else {
                return Err("check requires <field> <value>".into());
            };
            if check(&field, &value)? {
                println!("valid");
                Ok(())
            } else {
                Err(format!("invalid {}", field))
            }
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
