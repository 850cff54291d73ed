//! Spoken prompts
//!
//! Every enumerating prompt is built from the same candidate list the
//! resolver receives for that step, so the kiosk never offers a word it
//! cannot match.

use crate::resolver::Candidate;

/// Hangul syllables block
const HANGUL_FIRST: u32 = 0xAC00;
const HANGUL_LAST: u32 = 0xD7A3;
/// Syllables per initial/medial pair; index 0 means no final consonant
const FINALS: u32 = 28;

/// Whether a word ends in a Hangul syllable with a final consonant
///
/// `None` when the last character is not a Hangul syllable.
fn has_final_consonant(word: &str) -> Option<bool> {
    let last = u32::from(word.trim_end().chars().last()?);
    if (HANGUL_FIRST..=HANGUL_LAST).contains(&last) {
        Some((last - HANGUL_FIRST) % FINALS != 0)
    } else {
        None
    }
}

/// Object particle (을/를) for a word
fn object(word: &str) -> String {
    let particle = match has_final_consonant(word) {
        Some(true) => "을",
        Some(false) => "를",
        None => "을(를)",
    };
    format!("{word}{particle}")
}

fn aliases(candidates: &[Candidate], separator: &str) -> String {
    candidates
        .iter()
        .map(|c| c.alias.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Cue spoken right before the mic opens
#[must_use]
pub fn listening() -> String {
    "말씀하세요, 듣고 있습니다.".to_string()
}

/// Item confirmed by voice or tap
#[must_use]
pub fn item_confirmed(name: &str, has_options: bool) -> String {
    if has_options {
        format!("{} 선택하셨습니다. 옵션을 선택해주세요.", object(name))
    } else {
        format!("{} 선택하셨습니다.", object(name))
    }
}

#[must_use]
pub fn item_not_found() -> String {
    "해당 음료가 존재하지 않습니다. 다시 말씀해주세요.".to_string()
}

/// Entry prompt for an option group
#[must_use]
pub fn option_prompt(label: &str, candidates: &[Candidate]) -> String {
    format!(
        "{} 선택해주세요. {} 중에서 선택하세요.",
        object(label),
        aliases(candidates, ", ")
    )
}

#[must_use]
pub fn option_confirmed(alias: &str) -> String {
    format!("확인했습니다. {} 선택하셨습니다.", object(alias))
}

#[must_use]
pub fn option_not_found() -> String {
    "해당하는 옵션이 없습니다. 다시 말씀해주세요.".to_string()
}

#[must_use]
pub fn options_complete() -> String {
    "모든 옵션 선택이 완료되었습니다. 결제 페이지로 이동합니다.".to_string()
}

/// Entry prompt for payment selection
#[must_use]
pub fn payment_prompt(candidates: &[Candidate]) -> String {
    format!(
        "결제 방법을 선택해주세요. {} 중에서 선택하세요.",
        aliases(candidates, " 또는 ")
    )
}

#[must_use]
pub fn payment_not_found(candidates: &[Candidate]) -> String {
    format!(
        "해당하는 결제 방법이 없습니다. {} 중에서 선택해주세요.",
        aliases(candidates, " 또는 ")
    )
}

#[must_use]
pub fn payment_confirmed(name: &str) -> String {
    format!("{} 선택하셨습니다. 결제를 진행합니다.", object(name))
}

#[must_use]
pub fn processing() -> String {
    "결제가 진행 중입니다. 잠시만 기다려주세요.".to_string()
}

#[must_use]
pub fn payment_complete() -> String {
    "결제가 완료되었습니다. 영수증을 출력합니다.".to_string()
}

#[must_use]
pub fn payment_failed() -> String {
    "결제에 실패했습니다. 결제 방법을 다시 선택해주세요.".to_string()
}

#[must_use]
pub fn order_complete() -> String {
    "주문이 완료되었습니다. 감사합니다. 영수증을 확인해주세요.".to_string()
}
