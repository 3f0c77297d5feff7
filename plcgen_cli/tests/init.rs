use plcgen_core::AnyEmptyResult;
use plcgen_core::PlcgenConfig;
use predicates::prelude::PredicateBooleanExt;
use similar_asserts::assert_eq;

mod common;

#[test]
fn can_init() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::plcgen_cmd()
		.arg("init")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Created plcgen.toml"))
		.stdout(predicates::str::contains("Created templates directory"))
		.stdout(predicates::str::contains("Next steps:"));

	assert!(tmp.path().join("templates").is_dir());

	let content = std::fs::read_to_string(tmp.path().join("plcgen.toml"))?;
	let config = PlcgenConfig::parse(&content)?;
	assert_eq!(config.workbook, std::path::PathBuf::from("equipment.xlsx"));
	assert_eq!(config.status, "");
	assert!(content.contains("# [sheets]"));

	Ok(())
}

#[test]
fn init_does_not_overwrite() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join(".config"))?;
	let config_path = tmp.path().join(".config/plcgen.toml");
	std::fs::write(&config_path, "status = \"Released\"\n")?;

	common::plcgen_cmd()
		.arg("init")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("Config file already exists"))
		.stdout(predicates::str::contains("Next steps:").not());

	assert_eq!(std::fs::read_to_string(&config_path)?, "status = \"Released\"\n");
	assert!(!tmp.path().join("plcgen.toml").exists());

	Ok(())
}

#[test]
fn missing_subcommand_fails() {
	common::plcgen_cmd()
		.assert()
		.code(1)
		.stderr(predicates::str::contains("No subcommand specified"));
}
