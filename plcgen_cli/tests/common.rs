#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;
use plcgen_core::AnyEmptyResult;

pub fn plcgen_cmd() -> Command {
	let mut cmd = Command::cargo_bin("plcgen").unwrap_or_else(|e| panic!("plcgen binary: {e}"));
	cmd.env("NO_COLOR", "1").env_remove("PLCGEN_LOG");
	cmd
}

pub const MAIN_CSV: &str = "Equipment
PLC,Status,TypeEq,EqName,Number,Group,Function,Variants
PLC1,Released,Pump,P1,1,Pumps,FC_Pumps,
PLC1,Released,Pump,P2,2,Pumps,FC_Pumps,
PLC1,Draft,Pump,P3,3,Pumps,FC_Pumps,
";

pub const CONFIG_CSV: &str = "Config
3,1
Functions
PLC,Name,Group,Source
PLC1,FC_Pumps,Calls,
";

pub const PUMP_CSV: &str = "Pump
3,1,3,1
Library,,Tags
Name,Path,Name,Link,Type,Address,Table,Comment,Variants
FB_Pump,,Run,\"\"\"@EqName_Run\"\"\",Bool,%I@Number.0,Pumps,Run feedback,
";

/// Write a project with a csv workbook of two released pumps and one draft.
pub fn write_project(root: &Path) -> AnyEmptyResult {
	let workbook = root.join("workbook");
	std::fs::create_dir_all(&workbook)?;
	std::fs::create_dir_all(root.join("templates"))?;
	std::fs::write(workbook.join("Main.csv"), MAIN_CSV)?;
	std::fs::write(workbook.join("Config.csv"), CONFIG_CSV)?;
	std::fs::write(workbook.join("Pump.csv"), PUMP_CSV)?;
	std::fs::write(
		root.join("plcgen.toml"),
		"workbook = \"workbook\"\noutput = \"generated\"\nstatus = \"Released\"\n",
	)?;

	Ok(())
}
