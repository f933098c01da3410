use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tera::{Context, Error as TeraError, Tera};

/// Instructions the agent is configured with unless a file is supplied.
pub const SALES_EMAIL_INSTRUCTIONS: &str = include_str!("prompts/sales_email.md");

/// Opening user message for a session when none is given.
pub const LEAD_REQUEST_MESSAGE: &str = include_str!("prompts/lead_request.md");

#[derive(Debug, Clone, Serialize)]
pub struct InstructionContext {
    pub sales_rep: String,
    pub today: String,
    pub conference: Option<String>,
    pub email_tool: String,
}

impl InstructionContext {
    pub fn new(sales_rep: impl Into<String>, email_tool: impl Into<String>) -> Self {
        Self {
            sales_rep: sales_rep.into(),
            today: chrono::Local::now().format("%B %-d, %Y").to_string(),
            conference: None,
            email_tool: email_tool.into(),
        }
    }
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();
    let template_content = fs::read_to_string(&template_path).map_err(|e| {
        TeraError::chain(
            format!("Failed to read template file {}", template_path.display()),
            e,
        )
    })?;
    load_prompt(&template_content, context_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn context() -> InstructionContext {
        InstructionContext {
            sales_rep: "Mona Whalin".to_string(),
            today: "November 21, 2024".to_string(),
            conference: Some("Microsoft Ignite 2024".to_string()),
            email_tool: "SendEmailWithMessage".to_string(),
        }
    }

    #[test]
    fn test_sales_email_instructions() {
        let rendered = load_prompt(SALES_EMAIL_INSTRUCTIONS, &context()).unwrap();
        assert!(rendered.contains("The name of the sales representative is Mona Whalin."));
        assert!(rendered.contains(
            "It's currently November 21, 2024, use announcements that just happened at Microsoft Ignite 2024."
        ));
        assert!(rendered.contains("use the SendEmailWithMessage tool"));
        assert!(rendered.contains("If the email fails to send, keep trying."));
    }

    #[test]
    fn test_sales_email_instructions_without_conference() {
        let mut ctx = context();
        ctx.conference = None;
        let rendered = load_prompt(SALES_EMAIL_INSTRUCTIONS, &ctx).unwrap();
        assert!(rendered.contains("It's currently November 21, 2024.\n"));
    }

    #[test]
    fn test_load_prompt_missing_variable() {
        let template = "Hello, {{ name }}! You are {{ age }} years old.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alice".to_string());
        assert!(load_prompt(template, &context).is_err());
    }

    #[test]
    fn test_load_prompt_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("instructions.md");
        fs::write(&file_path, "Sign as {{ sales_rep }}.").unwrap();

        let result = load_prompt_file(&file_path, &context()).unwrap();
        assert_eq!(result, "Sign as Mona Whalin.");
    }

    #[test]
    fn test_load_prompt_file_missing_file() {
        let result = load_prompt_file("non_existent_template.md", &context());
        assert!(result.is_err());
    }

    #[test]
    fn test_lead_request_message_is_plain_text() {
        let rendered = load_prompt(LEAD_REQUEST_MESSAGE, &HashMap::<String, String>::new()).unwrap();
        assert_eq!(rendered, LEAD_REQUEST_MESSAGE);
    }
}
