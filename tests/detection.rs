// ABOUTME: Integration tests for project type detection and recipe rendering.
// ABOUTME: Uses temporary working copies with marker files.

mod support;

use skiff::deploy::{
    DeployErrorKind, EnvVar, ProjectType, RECIPE_FILE, RecipeParams, detect_project_type,
    recipe_exists, render_recipe, write_recipe,
};

fn params(env_vars: &[EnvVar]) -> RecipeParams<'_> {
    RecipeParams {
        deployment_id: "r3c1pe",
        port: 4000,
        env_vars,
    }
}

fn api_env() -> Vec<EnvVar> {
    vec![EnvVar::new("API_URL", "https://api.example.com")]
}

#[test]
fn detects_each_marker() {
    let cases = [
        ("next.config.ts", ProjectType::Next),
        ("next.config.mjs", ProjectType::Next),
        ("vite.config.js", ProjectType::React),
        ("go.mod", ProjectType::Golang),
        ("src/index.js", ProjectType::Node),
        ("index.js", ProjectType::Node),
    ];

    for (marker, expected) in cases {
        let dir = tempfile::tempdir().unwrap();
        support::write_files(dir.path(), &[(marker, "")]);
        assert_eq!(
            detect_project_type(dir.path()).unwrap(),
            expected,
            "marker {marker}"
        );
    }
}

#[test]
fn framework_markers_win_over_entry_points() {
    let dir = tempfile::tempdir().unwrap();
    support::write_files(
        dir.path(),
        &[("index.js", ""), ("src/index.js", ""), ("next.config.mjs", "")],
    );
    assert_eq!(detect_project_type(dir.path()).unwrap(), ProjectType::Next);
}

#[test]
fn no_marker_fails_service_discovery() {
    let dir = tempfile::tempdir().unwrap();
    support::write_files(dir.path(), &[("package.json", "{}")]);
    let err = detect_project_type(dir.path()).unwrap_err();
    assert_eq!(err.kind(), DeployErrorKind::ServiceDiscoveryFailed);
}

#[test]
fn missing_directory_fails_service_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let err = detect_project_type(&dir.path().join("nope")).unwrap_err();
    assert_eq!(err.kind(), DeployErrorKind::ServiceDiscoveryFailed);
}

#[test]
fn every_template_labels_and_exposes_port() {
    for project_type in [
        ProjectType::Node,
        ProjectType::Golang,
        ProjectType::Next,
        ProjectType::React,
    ] {
        let env = api_env();
        let recipe = render_recipe(project_type, &params(&env)).unwrap();
        assert!(
            recipe.contains("LABEL skiff.deployment=r3c1pe"),
            "{project_type} recipe missing label"
        );
        assert!(recipe.contains("EXPOSE 4000"), "{project_type} recipe missing port");
        assert!(
            recipe.contains(r#"ENV API_URL="https://api.example.com""#),
            "{project_type} recipe missing env"
        );
    }
}

#[tokio::test]
async fn written_recipe_is_detected_as_existing() {
    let dir = tempfile::tempdir().unwrap();
    assert!(!recipe_exists(dir.path()));

    let env = api_env();
    write_recipe(dir.path(), ProjectType::Node, &params(&env))
        .await
        .unwrap();

    assert!(recipe_exists(dir.path()));
    let written = std::fs::read_to_string(dir.path().join(RECIPE_FILE)).unwrap();
    assert_eq!(written, render_recipe(ProjectType::Node, &params(&env)).unwrap());
}
