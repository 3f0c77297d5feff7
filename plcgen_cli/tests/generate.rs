use plcgen_core::AnyEmptyResult;
use plcgen_core::Manifest;
use similar_asserts::assert_eq;

mod common;

#[test]
fn generate_writes_sources_and_manifest() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	common::plcgen_cmd()
		.arg("generate")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Extracted 2 instance(s)"))
		.stdout(predicates::str::contains("Wrote 4 file(s)."))
		.stdout(predicates::str::contains("4 import request(s)"));

	let plc = tmp.path().join("generated").join("PLC1");
	let function = std::fs::read_to_string(plc.join("functions").join("FC_Pumps.scl"))?;
	assert!(function.contains("REGION Call FB iDB-Pump|P1\n"));
	assert!(function.contains("    \"iDB-Pump|P2\"(Run := \"P2_Run\");\n"));
	assert!(!function.contains("P3"));

	let instance = std::fs::read_to_string(plc.join("instances").join("Pumps").join("iDB-Pump_P1.db"))?;
	assert!(instance.contains("\"FB_Pump\""));

	let tags = std::fs::read_to_string(plc.join("tags").join("Pumps.xml"))?;
	assert!(tags.contains("<LogicalAddress>%I2.0</LogicalAddress>"));

	let manifest: Manifest = serde_json::from_str(&std::fs::read_to_string(
		tmp.path().join("generated").join("import-manifest.json"),
	)?)?;
	let plc1 = &manifest.plcs["PLC1"];
	assert!(plc1.compiled);
	assert_eq!(plc1.groups, vec!["Pumps", "Calls"]);
	assert_eq!(plc1.imports.len(), 4);

	Ok(())
}

#[test]
fn generate_twice_is_a_no_op() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	common::plcgen_cmd()
		.arg("generate")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();
	let function_path = tmp.path().join("generated/PLC1/functions/FC_Pumps.scl");
	let first = std::fs::read_to_string(&function_path)?;

	common::plcgen_cmd()
		.arg("generate")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("already up to date"));

	assert_eq!(std::fs::read_to_string(&function_path)?, first);

	Ok(())
}

#[test]
fn generate_keeps_hand_written_code() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	common::plcgen_cmd()
		.arg("generate")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	let function_path = tmp.path().join("generated/PLC1/functions/FC_Pumps.scl");
	let edited = std::fs::read_to_string(&function_path)?
		.replace("BEGIN\n", "BEGIN\n// commissioning override\n");
	std::fs::write(&function_path, edited)?;

	common::plcgen_cmd()
		.arg("generate")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	let content = std::fs::read_to_string(&function_path)?;
	assert!(content.contains("BEGIN\n// commissioning override\nREGION Call FB iDB-Pump|P1\n"));
	assert_eq!(content.matches("REGION Call FB iDB-Pump|P1\n").count(), 1);

	Ok(())
}

#[test]
fn generate_dry_run_writes_nothing() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	common::plcgen_cmd()
		.arg("generate")
		.arg("--dry-run")
		.arg("--diff")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Dry run: would write 4 file(s):"))
		.stdout(predicates::str::contains("new generated/PLC1/functions/FC_Pumps.scl"))
		.stdout(predicates::str::contains("+REGION Call FB iDB-Pump|P1"));

	assert!(!tmp.path().join("generated").exists());

	Ok(())
}

#[test]
fn generate_status_flag_overrides_config() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	common::plcgen_cmd()
		.arg("generate")
		.arg("--status")
		.arg("Draft")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Extracted 1 instance(s)"));

	let function = std::fs::read_to_string(tmp.path().join("generated/PLC1/functions/FC_Pumps.scl"))?;
	assert!(function.contains("REGION Call FB iDB-Pump|P3\n"));
	assert!(!function.contains("iDB-Pump|P1"));

	Ok(())
}

#[test]
fn generate_verbose_logs_progress() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	common::plcgen_cmd()
		.arg("generate")
		.arg("--verbose")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stderr(predicates::str::contains("extracted model"));

	Ok(())
}

#[test]
fn generate_reports_missing_templates() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;
	let pump = std::fs::read_to_string(tmp.path().join("workbook/Pump.csv"))?;
	std::fs::write(tmp.path().join("workbook/Pump.csv"), pump.replacen("Pump\n", "Pump,x\n", 1))?;

	common::plcgen_cmd()
		.arg("generate")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(1)
		.stderr(predicates::str::contains("2 item(s) failed"))
		.stderr(predicates::str::contains("template for `Pump` not found"));

	Ok(())
}

#[test]
fn generate_without_workbook_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("plcgen.toml"), "workbook = \"missing.xlsx\"\n")?;

	common::plcgen_cmd()
		.arg("generate")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("failed to open workbook"));

	Ok(())
}

#[test]
fn generate_rejects_invalid_config() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("plcgen.toml"), "workbok = \"typo.xlsx\"\n")?;

	common::plcgen_cmd()
		.arg("generate")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("failed to parse config file"));

	Ok(())
}
