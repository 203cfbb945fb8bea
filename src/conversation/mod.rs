//! Multi-step dialogs driven by direct messages.
//!
//! A [`ConversationState`] is the step a user is on plus whatever they have
//! answered so far. [`ConversationState::advance`] is a pure transition: it
//! never touches storage, so checks that need the ledger (nickname
//! uniqueness) run in the manager before the transition is applied.

pub mod validation;

use crate::models::{Category, ProfileUpdate};
pub use validation::{is_skip_answer, validate_nickname, NicknameError};

/// Steps of the registration flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    Nickname,
    RealName,
    Phone,
}

/// Steps of the profile update flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStep {
    Phone,
    RealName,
    Category,
}

/// Answers collected during registration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationFields {
    pub nickname: Option<String>,
    pub real_name: Option<String>,
    pub phone: Option<String>,
}

/// Answers collected during a profile update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileFields {
    pub phone: Option<String>,
    pub real_name: Option<String>,
}

/// The one flow a user can be in
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationState {
    Registering {
        step: RegistrationStep,
        fields: RegistrationFields,
    },
    UpdatingProfile {
        step: ProfileStep,
        fields: ProfileFields,
    },
    AuthoringEvent {
        event_name: String,
    },
}

/// What the user sent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input<'a> {
    Text(&'a str),
    Category(Category),
}

/// Question to show for the step the user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Nickname,
    RealName,
    Phone,
    ProfilePhone,
    ProfileRealName,
    ProfileCategory,
    EventContent,
}

/// Why an answer was not accepted
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    InvalidNickname(NicknameError),
    NicknameTaken,
    EmptyAnswer,
    ExpectedCategory,
    UnexpectedCategory,
}

/// Everything a finished flow collected
#[derive(Debug, Clone, PartialEq)]
pub enum Completed {
    /// Free-text part of registration; the category is chosen with a button afterwards
    Registration {
        nickname: String,
        real_name: String,
        phone: Option<String>,
    },
    Profile(ProfileUpdate),
    Event { name: String, content: String },
}

/// Result of feeding one input to a state
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Next {
        state: ConversationState,
        prompt: Prompt,
    },
    Complete(Completed),
    Reject {
        reason: Rejection,
        prompt: Prompt,
    },
}

impl ConversationState {
    pub fn start_registration() -> Self {
        ConversationState::Registering {
            step: RegistrationStep::Nickname,
            fields: RegistrationFields::default(),
        }
    }

    pub fn start_profile_update() -> Self {
        ConversationState::UpdatingProfile {
            step: ProfileStep::Phone,
            fields: ProfileFields::default(),
        }
    }

    pub fn start_event(event_name: impl Into<String>) -> Self {
        ConversationState::AuthoringEvent {
            event_name: event_name.into(),
        }
    }

    /// The question for the current step
    pub fn prompt(&self) -> Prompt {
        match self {
            ConversationState::Registering { step, .. } => match step {
                RegistrationStep::Nickname => Prompt::Nickname,
                RegistrationStep::RealName => Prompt::RealName,
                RegistrationStep::Phone => Prompt::Phone,
            },
            ConversationState::UpdatingProfile { step, .. } => match step {
                ProfileStep::Phone => Prompt::ProfilePhone,
                ProfileStep::RealName => Prompt::ProfileRealName,
                ProfileStep::Category => Prompt::ProfileCategory,
            },
            ConversationState::AuthoringEvent { .. } => Prompt::EventContent,
        }
    }

    pub fn awaits_nickname(&self) -> bool {
        matches!(
            self,
            ConversationState::Registering {
                step: RegistrationStep::Nickname,
                ..
            }
        )
    }

    /// Feed one input and return the next state, the finished record or a rejection.
    ///
    /// A rejection leaves `self` untouched; callers keep the old state.
    pub fn advance(&self, input: Input<'_>) -> Transition {
        match self {
            ConversationState::Registering { step, fields } => {
                let text = match input {
                    Input::Text(text) => text,
                    Input::Category(_) => return self.reject(Rejection::UnexpectedCategory),
                };
                advance_registration(*step, fields, text)
            }
            ConversationState::UpdatingProfile { step, fields } => {
                advance_profile(*step, fields, input)
            }
            ConversationState::AuthoringEvent { event_name } => match input {
                Input::Text(text) if !text.trim().is_empty() => {
                    Transition::Complete(Completed::Event {
                        name: event_name.clone(),
                        content: text.trim().to_string(),
                    })
                }
                Input::Text(_) => self.reject(Rejection::EmptyAnswer),
                Input::Category(_) => self.reject(Rejection::UnexpectedCategory),
            },
        }
    }

    fn reject(&self, reason: Rejection) -> Transition {
        Transition::Reject {
            reason,
            prompt: self.prompt(),
        }
    }
}

fn advance_registration(
    step: RegistrationStep,
    fields: &RegistrationFields,
    text: &str,
) -> Transition {
    match step {
        RegistrationStep::Nickname => {
            if let Err(e) = validate_nickname(text) {
                return Transition::Reject {
                    reason: Rejection::InvalidNickname(e),
                    prompt: Prompt::Nickname,
                };
            }
            let mut fields = fields.clone();
            fields.nickname = Some(text.to_string());
            Transition::Next {
                state: ConversationState::Registering {
                    step: RegistrationStep::RealName,
                    fields,
                },
                prompt: Prompt::RealName,
            }
        }
        RegistrationStep::RealName => {
            let real_name = text.trim();
            if real_name.is_empty() {
                return Transition::Reject {
                    reason: Rejection::EmptyAnswer,
                    prompt: Prompt::RealName,
                };
            }
            let mut fields = fields.clone();
            fields.real_name = Some(real_name.to_string());
            Transition::Next {
                state: ConversationState::Registering {
                    step: RegistrationStep::Phone,
                    fields,
                },
                prompt: Prompt::Phone,
            }
        }
        RegistrationStep::Phone => {
            let phone = optional_answer(text);
            match (&fields.nickname, &fields.real_name) {
                (Some(nickname), Some(real_name)) => Transition::Complete(Completed::Registration {
                    nickname: nickname.clone(),
                    real_name: real_name.clone(),
                    phone,
                }),
                // Unreachable through `advance`; restart the flow if it ever happens
                _ => Transition::Next {
                    state: ConversationState::start_registration(),
                    prompt: Prompt::Nickname,
                },
            }
        }
    }
}

fn advance_profile(step: ProfileStep, fields: &ProfileFields, input: Input<'_>) -> Transition {
    match (step, input) {
        (ProfileStep::Phone, Input::Text(text)) => {
            let mut fields = fields.clone();
            fields.phone = optional_answer(text);
            Transition::Next {
                state: ConversationState::UpdatingProfile {
                    step: ProfileStep::RealName,
                    fields,
                },
                prompt: Prompt::ProfileRealName,
            }
        }
        (ProfileStep::RealName, Input::Text(text)) => {
            let real_name = text.trim();
            if real_name.is_empty() {
                return Transition::Reject {
                    reason: Rejection::EmptyAnswer,
                    prompt: Prompt::ProfileRealName,
                };
            }
            let mut fields = fields.clone();
            fields.real_name = Some(real_name.to_string());
            Transition::Next {
                state: ConversationState::UpdatingProfile {
                    step: ProfileStep::Category,
                    fields,
                },
                prompt: Prompt::ProfileCategory,
            }
        }
        (ProfileStep::Category, Input::Category(category)) => match &fields.real_name {
            Some(real_name) => Transition::Complete(Completed::Profile(ProfileUpdate {
                phone: fields.phone.clone(),
                real_name: real_name.clone(),
                category,
            })),
            None => Transition::Next {
                state: ConversationState::start_profile_update(),
                prompt: Prompt::ProfilePhone,
            },
        },
        (ProfileStep::Category, Input::Text(_)) => Transition::Reject {
            reason: Rejection::ExpectedCategory,
            prompt: Prompt::ProfileCategory,
        },
        (ProfileStep::Phone, Input::Category(_)) => Transition::Reject {
            reason: Rejection::UnexpectedCategory,
            prompt: Prompt::ProfilePhone,
        },
        (ProfileStep::RealName, Input::Category(_)) => Transition::Reject {
            reason: Rejection::UnexpectedCategory,
            prompt: Prompt::ProfileRealName,
        },
    }
}

fn optional_answer(text: &str) -> Option<String> {
    if is_skip_answer(text) {
        None
    } else {
        Some(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_next(transition: Transition) -> (ConversationState, Prompt) {
        match transition {
            Transition::Next { state, prompt } => (state, prompt),
            other => panic!("expected Next, got {:?}", other),
        }
    }

    #[test]
    fn test_registration_flow_is_linear() {
        let state = ConversationState::start_registration();
        assert_eq!(state.prompt(), Prompt::Nickname);

        let (state, prompt) = expect_next(state.advance(Input::Text("nik1")));
        assert_eq!(prompt, Prompt::RealName);

        let (state, prompt) = expect_next(state.advance(Input::Text("Ivan I")));
        assert_eq!(prompt, Prompt::Phone);

        match state.advance(Input::Text("+7 900 000 00 00")) {
            Transition::Complete(Completed::Registration {
                nickname,
                real_name,
                phone,
            }) => {
                assert_eq!(nickname, "nik1");
                assert_eq!(real_name, "Ivan I");
                assert_eq!(phone.as_deref(), Some("+7 900 000 00 00"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_nickname_keeps_state() {
        let state = ConversationState::start_registration();

        let transition = state.advance(Input::Text("bad nick"));
        assert_eq!(
            transition,
            Transition::Reject {
                reason: Rejection::InvalidNickname(NicknameError::InnerWhitespace),
                prompt: Prompt::Nickname,
            }
        );
        // The caller still holds the untouched state
        assert_eq!(state, ConversationState::start_registration());
    }

    #[test]
    fn test_phone_can_be_skipped() {
        let state = ConversationState::Registering {
            step: RegistrationStep::Phone,
            fields: RegistrationFields {
                nickname: Some("nik1".to_string()),
                real_name: Some("Ivan I".to_string()),
                phone: None,
            },
        };

        match state.advance(Input::Text("-")) {
            Transition::Complete(Completed::Registration { phone, .. }) => assert!(phone.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_registration_rejects_buttons_and_blank_names() {
        let state = ConversationState::start_registration();
        assert!(matches!(
            state.advance(Input::Category(Category::Teen)),
            Transition::Reject {
                reason: Rejection::UnexpectedCategory,
                ..
            }
        ));

        let (state, _) = expect_next(state.advance(Input::Text("nik1")));
        assert_eq!(
            state.advance(Input::Text("   ")),
            Transition::Reject {
                reason: Rejection::EmptyAnswer,
                prompt: Prompt::RealName,
            }
        );
    }

    #[test]
    fn test_profile_update_flow() {
        let state = ConversationState::start_profile_update();
        assert_eq!(state.prompt(), Prompt::ProfilePhone);

        let (state, prompt) = expect_next(state.advance(Input::Text("555")));
        assert_eq!(prompt, Prompt::ProfileRealName);

        let (state, prompt) = expect_next(state.advance(Input::Text("Petr P")));
        assert_eq!(prompt, Prompt::ProfileCategory);

        assert_eq!(
            state.advance(Input::Text("Adult")),
            Transition::Reject {
                reason: Rejection::ExpectedCategory,
                prompt: Prompt::ProfileCategory,
            }
        );

        assert_eq!(
            state.advance(Input::Category(Category::Adult)),
            Transition::Complete(Completed::Profile(ProfileUpdate {
                phone: Some("555".to_string()),
                real_name: "Petr P".to_string(),
                category: Category::Adult,
            }))
        );
    }

    #[test]
    fn test_event_authoring() {
        let state = ConversationState::start_event("Cup");
        assert_eq!(state.prompt(), Prompt::EventContent);
        assert!(matches!(
            state.advance(Input::Text("")),
            Transition::Reject {
                reason: Rejection::EmptyAnswer,
                ..
            }
        ));
        assert_eq!(
            state.advance(Input::Text(" Summer cup at noon ")),
            Transition::Complete(Completed::Event {
                name: "Cup".to_string(),
                content: "Summer cup at noon".to_string(),
            })
        );
    }

    #[test]
    fn test_awaits_nickname() {
        assert!(ConversationState::start_registration().awaits_nickname());
        assert!(!ConversationState::start_profile_update().awaits_nickname());
        assert!(!ConversationState::start_event("x").awaits_nickname());
    }
}
