// ABOUTME: Build recipe (Dockerfile) synthesis from a detected project type.
// ABOUTME: Four fixed templates with port, env declarations and start command filled in.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::{DeployError, Deployment, EnvVar, ProjectType};

/// File name of the generated build recipe.
pub const RECIPE_FILE: &str = "Dockerfile";

const NODE_IMAGE: &str = "node:22-alpine";
const GO_IMAGE: &str = "golang:1.24-bookworm";

/// Inputs to a recipe template.
#[derive(Debug, Clone)]
pub struct RecipeParams<'a> {
    pub deployment_id: &'a str,
    pub port: u16,
    pub env_vars: &'a [EnvVar],
}

impl<'a> From<&'a Deployment> for RecipeParams<'a> {
    fn from(d: &'a Deployment) -> Self {
        Self {
            deployment_id: d.id.as_str(),
            port: d.port,
            env_vars: &d.env_vars,
        }
    }
}

/// Whether the working copy already carries a build recipe.
pub fn recipe_exists(project_path: &Path) -> bool {
    project_path.join(RECIPE_FILE).is_file()
}

fn env_block(env_vars: &[EnvVar]) -> Result<String, DeployError> {
    let mut out = String::new();
    for var in env_vars {
        var.validate()?;
        // JSON string escaping is accepted by the builder's quoted form.
        let value = serde_json::to_string(&var.value).unwrap_or_else(|_| "\"\"".to_string());
        let _ = writeln!(out, "ENV {}={}", var.key, value);
    }
    Ok(out)
}

fn exec_form(args: &[&str]) -> String {
    let quoted: Vec<String> = args.iter().map(|a| format!("\"{}\"", a)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Start command baked into the recipe for each project type.
pub fn start_command(project_type: ProjectType, port: u16) -> Vec<String> {
    match project_type {
        ProjectType::Node => vec!["node".into(), "./src/index.js".into()],
        ProjectType::Golang => vec!["./app".into()],
        ProjectType::Next => vec!["npm".into(), "start".into()],
        ProjectType::React => vec![
            "npx".into(),
            "serve".into(),
            "-s".into(),
            "dist".into(),
            "-l".into(),
            port.to_string(),
        ],
    }
}

/// Render the recipe for `project_type`.
///
/// Fails with [`DeployError::InvalidEnvVar`] if any env key is not a plain name.
pub fn render_recipe(
    project_type: ProjectType,
    params: &RecipeParams<'_>,
) -> Result<String, DeployError> {
    let env = env_block(params.env_vars)?;
    let start = start_command(project_type, params.port);
    let start: Vec<&str> = start.iter().map(String::as_str).collect();
    let cmd = exec_form(&start);
    let port = params.port;
    let id = params.deployment_id;

    let recipe = match project_type {
        ProjectType::Node => format!(
            "FROM {NODE_IMAGE}\n\
             LABEL skiff.deployment={id}\n\
             WORKDIR /app\n\
             COPY . ./\n\
             {env}\
             RUN npm install\n\
             EXPOSE {port}\n\
             CMD {cmd}\n"
        ),
        ProjectType::Golang => format!(
            "FROM {GO_IMAGE}\n\
             LABEL skiff.deployment={id}\n\
             WORKDIR /app\n\
             COPY . ./\n\
             {env}\
             RUN go build -o app ./cmd\n\
             EXPOSE {port}\n\
             CMD {cmd}\n"
        ),
        ProjectType::Next => format!(
            "FROM {NODE_IMAGE}\n\
             LABEL skiff.deployment={id}\n\
             WORKDIR /app\n\
             COPY ./package*.json ./\n\
             {env}\
             RUN npm install --prefer-offline --no-audit --progress=false\n\
             COPY . ./\n\
             RUN npx prisma generate\n\
             RUN npm run build\n\
             EXPOSE {port}\n\
             CMD {cmd}\n"
        ),
        ProjectType::React => format!(
            "FROM {NODE_IMAGE}\n\
             LABEL skiff.deployment={id}\n\
             WORKDIR /app\n\
             COPY ./package*.json ./\n\
             {env}\
             RUN npm install --prefer-offline --no-audit --progress=false\n\
             COPY . ./\n\
             RUN npm run build\n\
             EXPOSE {port}\n\
             CMD {cmd}\n"
        ),
    };
    Ok(recipe)
}

/// Render and write the recipe into `project_path`, replacing any existing one.
pub async fn write_recipe(
    project_path: &Path,
    project_type: ProjectType,
    params: &RecipeParams<'_>,
) -> Result<PathBuf, DeployError> {
    let contents = render_recipe(project_type, params)?;
    let path = project_path.join(RECIPE_FILE);
    tokio::fs::write(&path, contents)
        .await
        .map_err(|e| DeployError::RecipeFailed(format!("{}: {}", path.display(), e)))?;
    tracing::debug!("wrote {} recipe to {}", project_type, path.display());
    Ok(path)
}
