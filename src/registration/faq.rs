//! Keyword FAQ responder for free text outside the registration flow.

use super::messages::Messages;

/// Words that route a message to a human operator.
const SUPPORT_KEYWORDS: &[&str] = &[
    "оператор",
    "человек",
    "поддержка",
    "помощь",
    "вопрос",
    "проблема",
    "связаться",
    "консультация",
];

/// Question → answer, checked in order.
const FAQ: &[(&str, &str)] = &[
    (
        "Что такое ESG?",
        "ESG (Environmental, Social, Governance) - это подход к оценке деятельности компаний, \
         учитывающий экологические, социальные и управленческие факторы.",
    ),
    (
        "Когда и где пройдет форум?",
        "Форум пройдет 17 июня 2025 года в Москве, в Точке кипения – Коммуна \
         (2-й Донской проезд, д. 9, стр. 3).",
    ),
    (
        "Как зарегистрироваться?",
        "Для регистрации просто следуйте инструкциям бота. \
         Вам нужно будет указать ФИО, email и номер телефона.",
    ),
    (
        "Сколько стоит участие?",
        "Участие в форуме бесплатное, но требуется предварительная регистрация.",
    ),
    (
        "Как связаться с организаторами?",
        "Вы можете связаться с организаторами через:\n\
         - Telegram: @LEXARKHOVA\n\
         - Email: info@esgtech.pro\n\
         - Телефон: +7 999 822-12-77",
    ),
];

/// Answer a free-text question.
///
/// Support keywords win over FAQ matches; with no match the reply lists the
/// known topics.
pub fn answer(messages: &Messages, text: &str) -> String {
    let text = text.to_lowercase();

    if SUPPORT_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return messages.support();
    }

    if let Some((_, answer)) = FAQ
        .iter()
        .find(|(question, _)| text.contains(&question.to_lowercase()))
    {
        return (*answer).to_string();
    }

    let mut topics = String::from("Вы можете задать вопрос по следующим темам:\n\n");
    for (question, _) in FAQ {
        topics.push_str("• ");
        topics.push_str(question);
        topics.push('\n');
    }
    topics
}
