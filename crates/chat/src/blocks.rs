use faqbot_core::{AnswerCandidate, BotError, FormId, PendingQuestion};
use serde::Serialize;

pub const CHOICE_FIELD: &str = "choice";
pub const NONE_OF_THE_ABOVE: &str = "none";
pub const ACTION_FIELD: &str = "action";
pub const SUBMIT_ACTION: &str = "submit";
pub const REJECT_ACTION: &str = "reject";
pub const BETTER_QUESTION_FIELD: &str = "better_question";
pub const ARTICLE_ID_FIELD: &str = "article_id";
pub const ANSWER_FIELD: &str = "answer";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub value: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
}

impl ButtonElement {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { value: value.into(), label: label.into(), style: None }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormOption {
    pub title: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormControl {
    Label {
        text: String,
    },
    Radio {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
        options: Vec<FormOption>,
    },
    Input {
        name: String,
        label: String,
        rows: u8,
    },
    Buttons {
        name: String,
        buttons: Vec<ButtonElement>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Form {
    pub id: String,
    pub controls: Vec<FormControl>,
}

impl Form {
    pub fn radio_values(&self, name: &str) -> Vec<&str> {
        self.controls
            .iter()
            .filter_map(|control| match control {
                FormControl::Radio { name: radio, options, .. } if radio == name => Some(options),
                _ => None,
            })
            .flatten()
            .map(|option| option.value.as_str())
            .collect()
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.controls
            .iter()
            .filter_map(|control| match control {
                FormControl::Input { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn button_values(&self) -> Vec<&str> {
        self.controls
            .iter()
            .filter_map(|control| match control {
                FormControl::Buttons { buttons, .. } => Some(buttons),
                _ => None,
            })
            .flatten()
            .map(|button| button.value.as_str())
            .collect()
    }
}

/// Rich-text message, optionally carrying a form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Form>,
}

pub struct MessageBuilder {
    content: String,
    form: Option<Form>,
}

impl MessageBuilder {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), form: None }
    }

    pub fn form<F>(mut self, form_id: &FormId, build: F) -> Self
    where
        F: FnOnce(&mut FormBuilder),
    {
        let mut builder = FormBuilder::default();
        build(&mut builder);
        self.form = Some(Form { id: form_id.to_string(), controls: builder.controls });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { content: self.content, form: self.form }
    }
}

#[derive(Default)]
pub struct FormBuilder {
    controls: Vec<FormControl>,
}

impl FormBuilder {
    pub fn label(&mut self, text: impl Into<String>) -> &mut Self {
        self.controls.push(FormControl::Label { text: text.into() });
        self
    }

    pub fn radio<F>(&mut self, name: impl Into<String>, build: F) -> &mut Self
    where
        F: FnOnce(&mut RadioBuilder),
    {
        let mut builder = RadioBuilder::default();
        build(&mut builder);
        self.controls.push(FormControl::Radio {
            name: name.into(),
            default_value: builder.default_value,
            options: builder.options,
        });
        self
    }

    pub fn input(
        &mut self,
        name: impl Into<String>,
        label: impl Into<String>,
        rows: u8,
    ) -> &mut Self {
        self.controls.push(FormControl::Input { name: name.into(), label: label.into(), rows });
        self
    }

    pub fn buttons<F>(&mut self, name: impl Into<String>, build: F) -> &mut Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.controls.push(FormControl::Buttons { name: name.into(), buttons: builder.elements });
        self
    }
}

#[derive(Default)]
pub struct RadioBuilder {
    default_value: Option<String>,
    options: Vec<FormOption>,
}

impl RadioBuilder {
    pub fn option(&mut self, title: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.options.push(FormOption { title: title.into(), value: value.into() });
        self
    }

    pub fn default_value(&mut self, value: impl Into<String>) -> &mut Self {
        self.default_value = Some(value.into());
        self
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }
}

pub fn answer_message(answer: impl Into<String>) -> MessageTemplate {
    MessageBuilder::new(answer).build()
}

pub fn apology_message(error: &BotError, support_url: &str) -> MessageTemplate {
    MessageBuilder::new(format!(
        "{} Check if you find an answer on <a href=\"{support_url}\">Support</a>.",
        error.user_message()
    ))
    .build()
}

/// Placeholder shown to the asker while a moderator looks at the question.
pub fn escalation_notice(support_url: &str) -> MessageTemplate {
    MessageBuilder::new(format!(
        "Sorry, I could not find an answer to your question. A moderator has been asked to help \
         and this message will be updated with the answer. Meanwhile, check if you find an \
         answer on <a href=\"{support_url}\">Support</a>."
    ))
    .build()
}

pub fn not_relevant_message() -> MessageTemplate {
    MessageBuilder::new(
        "A moderator reviewed your question and marked it as not relevant for this FAQ.",
    )
    .build()
}

pub fn disambiguation_message(form_id: &FormId, candidates: &[AnswerCandidate]) -> MessageTemplate {
    MessageBuilder::new("I found these possible answers. Which question is closest to yours?")
        .form(form_id, |form| {
            form.radio(CHOICE_FIELD, |radio| {
                for (index, candidate) in candidates.iter().enumerate() {
                    let title = if candidate.representative_question.trim().is_empty() {
                        format!("Answer {}", index + 1)
                    } else {
                        candidate.representative_question.clone()
                    };
                    radio.option(title, index.to_string());
                }
                radio.option("None of the above", NONE_OF_THE_ABOVE).default_value("0");
            })
            .buttons(ACTION_FIELD, |actions| {
                actions.button(
                    ButtonElement::new(SUBMIT_ACTION, "Show answer").style(ButtonStyle::Primary),
                );
            });
        })
        .build()
}

pub fn moderation_request_message(pending: &PendingQuestion) -> MessageTemplate {
    let mut content = format!(
        "<b>Unanswered question</b><br>{}<br><i>Asked by {}</i>",
        escape_html(&pending.question),
        escape_html(&pending.asker_id)
    );
    if !pending.candidates().is_empty() {
        content.push_str("<br>Rejected suggestions:<ul>");
        for candidate in pending.candidates() {
            content.push_str(&format!(
                "<li>{} ({:.0})</li>",
                escape_html(&candidate.representative_question),
                candidate.score
            ));
        }
        content.push_str("</ul>");
    }

    MessageBuilder::new(content)
        .form(&pending.form_id, |form| {
            form.label("Answer with a support article ID or with a new answer text.")
                .input(BETTER_QUESTION_FIELD, "Better phrasing of the question (optional)", 1)
                .input(ARTICLE_ID_FIELD, "Support article ID", 1)
                .input(ANSWER_FIELD, "Answer text", 4)
                .buttons(ACTION_FIELD, |actions| {
                    actions
                        .button(
                            ButtonElement::new(SUBMIT_ACTION, "Submit")
                                .style(ButtonStyle::Primary),
                        )
                        .button(
                            ButtonElement::new(REJECT_ACTION, "Not relevant")
                                .style(ButtonStyle::Danger),
                        );
                });
        })
        .build()
}

/// Replaces the moderation form once the question is settled.
pub fn moderation_closed_message(question: &str, outcome: &str) -> MessageTemplate {
    MessageBuilder::new(format!(
        "<b>Question</b><br>{}<br>{}",
        escape_html(question),
        escape_html(outcome)
    ))
    .build()
}

pub fn moderator_error_message(error: &BotError) -> MessageTemplate {
    MessageBuilder::new(escape_html(&error.moderator_message())).build()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
