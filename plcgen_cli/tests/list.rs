use plcgen_core::AnyEmptyResult;
use rstest::rstest;
use similar_asserts::assert_eq;

mod common;

#[test]
fn list_prints_instances() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	common::plcgen_cmd()
		.arg("list")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("PLC1 (2 instance(s))"))
		.stdout(predicates::str::contains("  iDB-Pump|P1 [Pump] #1000 -> FC_Pumps"))
		.stdout(predicates::str::contains("  iDB-Pump|P2 [Pump] #1020 -> FC_Pumps"))
		.stdout(predicates::str::contains("1 PLC(s), 2 instance(s)"));

	assert!(!tmp.path().join("generated").exists());

	Ok(())
}

#[rstest]
#[case::configured_status(None, 2)]
#[case::draft_status(Some("Draft"), 1)]
#[case::every_status(Some(""), 3)]
fn list_json_respects_status(#[case] status: Option<&str>, #[case] expected: usize) -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	let mut cmd = common::plcgen_cmd();
	cmd.arg("list").arg("--format").arg("json").arg("--path").arg(tmp.path());
	if let Some(status) = status {
		cmd.arg("--status").arg(status);
	}
	let output = cmd.assert().success().get_output().stdout.clone();

	let json: serde_json::Value = serde_json::from_slice(&output)?;
	let instances = json["plcs"][0]["instances"]
		.as_array()
		.unwrap_or_else(|| panic!("instances array in {json}"));
	assert_eq!(instances.len(), expected);
	assert_eq!(json["report"]["instances"], expected);
	assert_eq!(json["plcs"][0]["functions"][0], "FC_Pumps");

	Ok(())
}

#[test]
fn list_without_matching_rows() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	common::plcgen_cmd()
		.arg("list")
		.arg("--status")
		.arg("Retired")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("No instances found."));

	Ok(())
}
