#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

mod common;

use assert_cmd::Command;
use common::TestProject;
use predicates::prelude::*;
use serde_json::Value;

/// プロジェクトに組み込み構成の stack.kdl を作る
fn init_project() -> TestProject {
    let project = TestProject::new();
    project.lamp().arg("init").assert().success();
    project
}

fn synth_json(project: &TestProject, args: &[&str]) -> Value {
    let output = project
        .lamp()
        .arg("synth")
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).unwrap()
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("lamp").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("CloudFormation"))
        .stdout(predicate::str::contains("synth"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("graph"))
        .stdout(predicate::str::contains("init"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("lamp").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lampstack"));
}

/// synthコマンドのヘルプに位置引数と出力オプションがあることを確認
#[test]
fn test_synth_help() {
    let mut cmd = Command::cargo_bin("lamp").unwrap();
    cmd.arg("synth")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[STAGE]"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--format"))
        .stdout(predicate::str::contains("--builtin"));
}

/// 不正なコマンドでエラーになることを確認
#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("lamp").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

/// stack.kdl がない場所では lamp init を案内する
#[test]
fn test_validate_without_project() {
    let project = TestProject::new();
    project
        .lamp()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("lamp init"));
}

/// 組み込み構成から標準出力にテンプレートを出す
#[test]
fn test_synth_builtin_to_stdout() {
    let project = TestProject::new();
    let template = synth_json(&project, &["--builtin"]);

    assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
    assert_eq!(template["Resources"].as_object().unwrap().len(), 22);
    assert_eq!(
        template["Resources"]["LampALB"]["Type"],
        "AWS::ElasticLoadBalancingV2::LoadBalancer"
    );
    assert_eq!(
        template["Outputs"]["LoadBalancerDNS"]["Value"],
        serde_json::json!({"Fn::GetAtt": ["LampALB", "DNSName"]})
    );
}

/// 同じ定義からは毎回同じテンプレートが出る
#[test]
fn test_synth_is_deterministic() {
    let project = TestProject::new();
    let first = project
        .lamp()
        .args(["synth", "--builtin"])
        .output()
        .unwrap()
        .stdout;
    let second = project
        .lamp()
        .args(["synth", "--builtin"])
        .output()
        .unwrap()
        .stdout;
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

/// YAML形式で出力できることを確認
#[test]
fn test_synth_yaml() {
    let project = TestProject::new();
    let output = project
        .lamp()
        .args(["synth", "--builtin", "--format", "yaml"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let template: serde_yaml::Value = serde_yaml::from_slice(&output).unwrap();
    assert_eq!(
        template["Resources"]["LampCluster"]["Type"].as_str(),
        Some("AWS::ECS::Cluster")
    );
}

/// ユーザー設定の output_format が既定の出力形式になる
#[test]
fn test_user_config_output_format() {
    let project = TestProject::new();
    project.write_user_config("output_format: yaml\n");

    project
        .lamp()
        .args(["synth", "--builtin"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("AWSTemplateFormatVersion"));

    // フラグが優先
    let template = synth_json(&project, &["--builtin", "--format", "json"]);
    assert!(template["Resources"].is_object());
}

/// init で作った stack.kdl からテンプレートを生成
#[test]
fn test_init_then_synth() {
    let project = init_project();
    assert!(project.read("stack.kdl").contains("load-balancer \"LampALB\""));

    let from_project = synth_json(&project, &[]);
    let builtin = synth_json(&project, &["--builtin"]);
    assert_eq!(from_project, builtin);
}

/// 既存の stack.kdl は --force なしでは上書きしない
#[test]
fn test_init_refuses_to_overwrite() {
    let project = TestProject::new();
    project.write_stack_kdl("stack \"Mine\"\n");

    project
        .lamp()
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    assert_eq!(project.read("stack.kdl"), "stack \"Mine\"\n");

    project.lamp().args(["init", "--force"]).assert().success();
    assert!(project.read("stack.kdl").contains("CdkLampStack"));
}

/// init --name でスタック名を指定
#[test]
fn test_init_with_name() {
    let project = TestProject::new();
    project
        .lamp()
        .args(["init", "--name", "StagingLamp"])
        .assert()
        .success();

    let template = synth_json(&project, &[]);
    assert_eq!(
        template["Resources"]["LampTaskDef"]["Properties"]["Family"],
        "StagingLampLampTaskDef"
    );
}

/// -o でファイルに書き出す
#[test]
fn test_synth_to_file() {
    let project = init_project();
    project
        .lamp()
        .args(["synth", "-o", "out/template.json"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("22 resources"));

    let template: Value = serde_json::from_str(&project.read("out/template.json")).unwrap();
    assert!(template["Resources"]["WildcardALBARecord"].is_object());
}

/// ステージ別ファイルで既存リソースのIDを差し替える
#[test]
fn test_stage_override() {
    let project = init_project();
    project.write(
        "stack.prod.kdl",
        "network {\n    vpc \"vpc-prod\"\n    public-subnets \"subnet-pub-a\" \"subnet-pub-c\"\n}\n",
    );

    let template = synth_json(&project, &["prod"]);
    assert_eq!(template["Parameters"]["VpcId"]["Default"], "vpc-prod");
    assert_eq!(
        template["Parameters"]["PublicSubnetIds"]["Default"],
        "subnet-pub-a,subnet-pub-c"
    );

    // LAMP_STAGE 環境変数でも指定できる
    let output = project
        .lamp()
        .env("LAMP_STAGE", "prod")
        .arg("synth")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let template: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(template["Parameters"]["VpcId"]["Default"], "vpc-prod");

    // ステージ未指定ならルート定義のまま
    let template = synth_json(&project, &[]);
    assert_eq!(
        template["Parameters"]["VpcId"]["Default"],
        "vpc-02b5eb5d25b928589"
    );
}

/// 位置引数と-sフラグの同時指定はエラーになることを確認
#[test]
fn test_stage_conflict_positional_and_flag() {
    let project = TestProject::new();
    project
        .lamp()
        .args(["synth", "prod", "-s", "dev"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

/// 正常な定義の検証
#[test]
fn test_validate_success() {
    let project = init_project();
    project
        .lamp()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("スタック定義は正常です"))
        .stdout(predicate::str::contains("AWS::ECS::TaskDefinition"))
        .stdout(predicate::str::contains("MyHostedZone"));
}

/// 壊れた参照はすべて報告されて失敗する
#[test]
fn test_validate_reports_issues() {
    let project = init_project();
    project.write(
        "stack.local.kdl",
        "service \"LampService\" cluster=\"MissingCluster\" task=\"MissingTask\"\n",
    );

    project
        .lamp()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("2 件の問題"))
        .stderr(predicate::str::contains("MissingCluster"))
        .stderr(predicate::str::contains("MissingTask"));

    // synth も同じ理由で失敗する
    project
        .lamp()
        .arg("synth")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

/// 作成順序ではクラスターがサービスより先
#[test]
fn test_graph_order() {
    let project = TestProject::new();
    let output = project
        .lamp()
        .args(["graph", "--builtin"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();

    let position = |id: &str| text.find(id).unwrap();
    assert!(position("LampCluster") < position("LampService"));
    assert!(position("LampALB") < position("MyListener"));
    assert!(position("MyListener") < position("PhpMyAdminRule"));
}

/// --waves で並列グループ表示
#[test]
fn test_graph_waves() {
    let project = TestProject::new();
    project
        .lamp()
        .args(["graph", "--builtin", "--waves"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wave 1"))
        .stdout(predicate::str::contains("ALBSecurityGroup"));
}
