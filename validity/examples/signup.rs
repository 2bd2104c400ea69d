//! Signup form driven from a script of input events.
//!
//! Run with `cargo run -p validity --example signup`; debug logs go to
//! `signup.log`.

use std::fs::File;
use std::time::Duration;

use log::LevelFilter;
use simplelog::{Config, WriteLogger};
use validity::prelude::*;

const TAKEN: &[&str] = &["admin", "root", "dio"];

fn available() -> ValidatorDefinition {
    ValidatorDefinition::future(|value, _| async move {
        // Stand-in for a server round trip.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let name = value.as_str().unwrap_or_default().to_lowercase();
        if TAKEN.contains(&name.as_str()) {
            Err(Rejection::with_reason(format!("'{name}' is taken")))
        } else {
            Ok(true)
        }
    })
    .with_message(MessageSource::format(|field, _| format!("{field} is already taken")))
}

fn print(group: &ValidityGroup) {
    match serde_json::to_string_pretty(&group.result()) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: {}", e),
    }
}

#[tokio::main]
async fn main() {
    // Initialize file logging
    if let Ok(log_file) = File::create("signup.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, Config::default(), log_file);
    }

    let config = ValidityConfig::new()
        .with_classes(ClassOverrides {
            invalid: Some("has-error".into()),
            ..Default::default()
        })
        .into_shared();
    let cx = ValidationContext::new(config).with_validator("available", available());

    let fields = (
        cx.field(
            "username",
            "",
            ValidatorRef::rules()
                .with("required", true)
                .with("minlength", RuleSpec::with_message(3, "at least 3 characters"))
                .with("available", true),
        ),
        cx.field(
            "email",
            "",
            ValidatorRef::rules().with("required", true).with("email", true),
        ),
        cx.field("age", "", ValidatorRef::rules().with("min", 13).with("max", 120)),
    );
    let (username, email, age) = match fields {
        (Ok(username), Ok(email), Ok(age)) => (username, email, age),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            eprintln!("Error: {}", e);
            return;
        }
    };

    let form = ValidityGroup::new();
    form.register("username", username.clone());
    form.register("email", email.clone());
    form.register("age", age.clone());
    form.subscribe(|event| match event {
        ValidityEvent::Valid => println!("-> form is valid"),
        ValidityEvent::Invalid => println!("-> form is invalid"),
        _ => {}
    });

    println!("== first attempt");
    username.value_changed("dio");
    username.blurred();
    email.value_changed("dio@");
    email.blurred();
    age.value_changed("9");
    age.blurred();

    let validation = form.validate();
    println!("username progress: {:?}", username.progresses().get("available"));
    validation.await;
    print(&form);
    println!("username classes: {}", username.classes().join(" "));

    println!("== second attempt");
    username.value_changed("jotaro");
    email.value_changed("jotaro@example.com");
    age.value_changed("17");

    if form.validate().await {
        println!("submitted");
    }
    print(&form);

    form.reset_results(None);
    println!("== after reset: valid={} dirty={}", form.valid(), form.dirty());
}
