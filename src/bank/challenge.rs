//!
//! Interactive credential and challenge handling.
//!
//! The FinTS client never reads the terminal itself; PIN entry, TAN mechanism selection and
//! TAN entry go through a `ChallengeProvider`. `TerminalChallenge` is the interactive
//! implementation used by the binary.

use super::types::BankError;

/// Two-step TAN mechanism offered by the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TanMechanism {
	/// Security function code, e.g. `942`.
	pub security_function: String,
	/// Human-readable name from the bank parameters, when known.
	pub name: String,
	/// Whether the bank wants the TAN medium named when a task is announced.
	pub medium_required: bool,
}

/// Challenge issued by the bank for a task that needs a TAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TanChallenge {
	/// Task reference the TAN has to be submitted for.
	pub task_reference: String,
	/// Challenge text to show to the user.
	pub text: String,
	/// Name of the TAN medium (phone, generator) the bank addressed.
	pub medium: Option<String>,
}

/// Source of secrets and answers during bank authentication.
pub trait ChallengeProvider: Send + Sync {
	/// Ask for the PIN of `user_id`.
	fn pin(&self, user_id: &str) -> Result<String, BankError>;

	/// Choose one of several permitted TAN mechanisms, returning its security function code.
	fn select_mechanism(&self, options: &[TanMechanism]) -> Result<String, BankError>;

	/// Choose one of several TAN media (phones, generators) registered for the user.
	fn select_medium(&self, media: &[String]) -> Result<String, BankError>;

	/// Answer a TAN challenge.
	fn tan(&self, challenge: &TanChallenge) -> Result<String, BankError>;
}

/// Challenge provider that prompts on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalChallenge;

impl ChallengeProvider for TerminalChallenge {
	fn pin(&self, user_id: &str) -> Result<String, BankError> {
		dialoguer::Password::new()
			.with_prompt(format!("Enter PIN for {}", user_id))
			.interact()
			.map_err(|e| BankError::ChallengeError(format!("PIN prompt failed: {}", e)))
	}

	fn select_mechanism(&self, options: &[TanMechanism]) -> Result<String, BankError> {
		let labels: Vec<String> = options
			.iter()
			.map(|m| format!("{} ({})", m.name, m.security_function))
			.collect();
		let index = dialoguer::Select::new()
			.with_prompt("Choose a TAN mechanism")
			.items(&labels)
			.default(0)
			.interact()
			.map_err(|e| BankError::ChallengeError(format!("Mechanism prompt failed: {}", e)))?;

		options
			.get(index)
			.map(|m| m.security_function.clone())
			.ok_or_else(|| BankError::ChallengeError("No TAN mechanism selected".to_string()))
	}

	fn select_medium(&self, media: &[String]) -> Result<String, BankError> {
		let index = dialoguer::Select::new()
			.with_prompt("Choose a TAN medium")
			.items(media)
			.default(0)
			.interact()
			.map_err(|e| BankError::ChallengeError(format!("Medium prompt failed: {}", e)))?;

		media
			.get(index)
			.cloned()
			.ok_or_else(|| BankError::ChallengeError("No TAN medium selected".to_string()))
	}

	fn tan(&self, challenge: &TanChallenge) -> Result<String, BankError> {
		println!("A TAN is required: {}", challenge.text);
		if let Some(medium) = &challenge.medium {
			println!("TAN medium: {}", medium);
		}
		dialoguer::Input::<String>::new()
			.with_prompt("Please enter TAN")
			.interact_text()
			.map_err(|e| BankError::ChallengeError(format!("TAN prompt failed: {}", e)))
	}
}
