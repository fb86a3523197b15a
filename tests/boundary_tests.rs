use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use uuid::Uuid;

mod common;
use common::{approve_line, command_file, create_line, invest_line};

#[test]
fn test_boundary_numerical_values() {
    let uuid = Uuid::new_v4();
    let input = command_file(&[
        create_line(uuid, "79228162514264337593543950335"),
        approve_line(uuid),
        invest_line(uuid, "investor-1", "79228162514264337593543950335"),
    ]);

    let mut cmd = Command::new(cargo_bin!("loan-engine"));
    cmd.arg(input.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "{},borrower-1,79228162514264337593543950335,10,7.5,79228162514264337593543950335,INVESTED",
            uuid
        )));
}

#[test]
fn test_extreme_decimal_precision() {
    let uuid = Uuid::new_v4();
    let input = command_file(&[
        create_line(uuid, "0.0002"),
        approve_line(uuid),
        invest_line(uuid, "investor-1", "0.0001"),
        invest_line(uuid, "investor-2", "0.0001"),
    ]);

    let mut cmd = Command::new(cargo_bin!("loan-engine"));
    cmd.arg(input.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "{},borrower-1,0.0002,10,7.5,0.0002,INVESTED",
            uuid
        )));
}
