use serde::{
    Deserialize,
    Serialize,
};

/// Separator NX-API expects between several commands in one `input`.
const COMMAND_SEPARATOR: &str = " ;";

/// `{"ins_api": {...}}` body of a `cli_show` request.
#[derive(Debug, Clone, Serialize)]
pub struct InsApiRequest {
    ins_api: RequestFields,
}

#[derive(Debug, Clone, Serialize)]
struct RequestFields {
    version: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    chunk: &'static str,
    sid: &'static str,
    input: String,
    output_format: &'static str,
}

impl InsApiRequest {
    pub fn cli_show(commands: &[&str]) -> Self {
        Self {
            ins_api: RequestFields {
                version: "1.0",
                kind: "cli_show",
                chunk: "0",
                sid: "1",
                input: commands.join(COMMAND_SEPARATOR),
                output_format: "json",
            },
        }
    }

    pub fn input(&self) -> &str {
        &self.ins_api.input
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsApiResponse {
    pub ins_api: InsApi,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsApi {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub sid: String,
    pub outputs: Outputs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Outputs {
    pub output: OneOrMany<Output>,
}

/// The device sends a bare object for a single command and a list otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(one) => vec![one],
            OneOrMany::Many(many) => many,
        }
    }
}

/// Result of one command, echoing the command text in `input`.
#[derive(Debug, Clone, Deserialize)]
pub struct Output {
    pub input: String,
    #[serde(default)]
    pub msg: String,
    pub code: String,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl Output {
    pub fn is_success(&self) -> bool {
        self.code == "200"
    }

    pub fn answers(&self, command: &str) -> bool {
        self.input.trim() == command.trim()
    }
}

impl InsApiResponse {
    pub fn into_outputs(self) -> Vec<Output> {
        self.ins_api.outputs.output.into_vec()
    }
}
