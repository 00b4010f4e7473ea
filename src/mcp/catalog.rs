// ABOUTME: Static MCP resources and prompt templates served by every session
// ABOUTME: Course-design guidelines as readable resources, authoring prompts with argument substitution

use serde_json::{json, Map, Value};

/// Read-only document exposed through `resources/read`
#[derive(Debug, Clone, Copy)]
pub struct StaticResource {
    /// Resource URI
    pub uri: &'static str,
    /// Display name
    pub name: &'static str,
    /// Short description
    pub description: &'static str,
    /// MIME type of `text`
    pub mime_type: &'static str,
    /// Document body
    pub text: &'static str,
}

/// Declared prompt argument
#[derive(Debug, Clone, Copy)]
pub struct PromptArgument {
    /// Argument name, referenced as `{{name}}` in the template
    pub name: &'static str,
    /// Argument description
    pub description: &'static str,
    /// Whether `prompts/get` must supply it
    pub required: bool,
}

/// Prompt template exposed through `prompts/get`
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    /// Prompt name
    pub name: &'static str,
    /// Short description
    pub description: &'static str,
    /// Declared arguments
    pub arguments: &'static [PromptArgument],
    /// User message body with `{{argument}}` placeholders
    pub template: &'static str,
}

/// Guideline documents
pub const RESOURCES: &[StaticResource] = &[
    StaticResource {
        uri: "learnhub://guidelines/course-design",
        name: "Course design guidelines",
        description: "How LearnHub courses are structured and titled",
        mime_type: "text/markdown",
        text: "# Course design\n\n\
               - Open with the learning outcomes a student can check off.\n\
               - Keep modules between three and seven lessons.\n\
               - Titles are imperative and under 60 characters.\n\
               - Every module ends with a practice lesson or quiz.\n",
    },
    StaticResource {
        uri: "learnhub://guidelines/lesson-structure",
        name: "Lesson structure guidelines",
        description: "Recommended sections and length of a lesson",
        mime_type: "text/markdown",
        text: "# Lesson structure\n\n\
               1. Hook: one paragraph on why the topic matters.\n\
               2. Concept: the idea, with one worked example.\n\
               3. Practice: an exercise with a checkable answer.\n\
               4. Recap: three bullet points.\n\n\
               Aim for 10 to 15 minutes of reading time.\n",
    },
];

/// Authoring prompts
pub const PROMPTS: &[PromptTemplate] = &[
    PromptTemplate {
        name: "create_course_outline",
        description: "Draft a module and lesson outline for a new course",
        arguments: &[
            PromptArgument {
                name: "topic",
                description: "Subject of the course",
                required: true,
            },
            PromptArgument {
                name: "audience",
                description: "Who the course is for",
                required: false,
            },
        ],
        template: "Draft a LearnHub course outline about {{topic}} for {{audience}}. \
                   Follow learnhub://guidelines/course-design and list modules with their lessons.",
    },
    PromptTemplate {
        name: "improve_lesson",
        description: "Review an existing lesson against the lesson structure guidelines",
        arguments: &[
            PromptArgument {
                name: "course_id",
                description: "Course containing the lesson",
                required: true,
            },
            PromptArgument {
                name: "lesson_id",
                description: "Lesson to review",
                required: true,
            },
        ],
        template: "Fetch lesson {{lesson_id}} of course {{course_id}} with the get_lesson tool, \
                   compare it with learnhub://guidelines/lesson-structure, and propose concrete edits.",
    },
];

const DEFAULT_AUDIENCE: &str = "a general audience";

/// `resources/list` result
#[must_use]
pub fn list_resources() -> Value {
    let resources: Vec<Value> = RESOURCES
        .iter()
        .map(|r| {
            json!({
                "uri": r.uri,
                "name": r.name,
                "description": r.description,
                "mimeType": r.mime_type,
            })
        })
        .collect();
    json!({ "resources": resources })
}

/// `resources/read` result, `None` for an unknown URI
#[must_use]
pub fn read_resource(uri: &str) -> Option<Value> {
    RESOURCES.iter().find(|r| r.uri == uri).map(|r| {
        json!({
            "contents": [{
                "uri": r.uri,
                "mimeType": r.mime_type,
                "text": r.text,
            }]
        })
    })
}

/// `prompts/list` result
#[must_use]
pub fn list_prompts() -> Value {
    let prompts: Vec<Value> = PROMPTS
        .iter()
        .map(|p| {
            let arguments: Vec<Value> = p
                .arguments
                .iter()
                .map(|a| {
                    json!({
                        "name": a.name,
                        "description": a.description,
                        "required": a.required,
                    })
                })
                .collect();
            json!({
                "name": p.name,
                "description": p.description,
                "arguments": arguments,
            })
        })
        .collect();
    json!({ "prompts": prompts })
}

/// `prompts/get` result.
///
/// # Errors
///
/// Returns a message naming the unknown prompt or the missing argument
pub fn get_prompt(name: &str, arguments: &Map<String, Value>) -> Result<Value, String> {
    let prompt = PROMPTS
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| format!("Unknown prompt: {name}"))?;

    let mut text = prompt.template.to_owned();
    for argument in prompt.arguments {
        let value = match arguments.get(argument.name) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ if argument.required => {
                return Err(format!("Missing required argument: {}", argument.name));
            }
            _ => DEFAULT_AUDIENCE.to_owned(),
        };
        text = text.replace(&format!("{{{{{}}}}}", argument.name), &value);
    }

    Ok(json!({
        "description": prompt.description,
        "messages": [{
            "role": "user",
            "content": { "type": "text", "text": text }
        }]
    }))
}
