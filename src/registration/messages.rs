//! User-facing message templates.
//!
//! Every string the bot sends is built here from the event and admin
//! settings, so channel adapters and the dispatcher never format text
//! themselves.

use crate::config::{AdminContacts, EventConfig};
use crate::users::{ReminderOffset, User};

pub const EMAIL_PROMPT: &str = "Спасибо! Теперь, пожалуйста, введите ваш email:";
pub const PHONE_PROMPT: &str = "Отлично! Теперь, пожалуйста, введите ваш номер телефона:";
pub const CONFIRM_REPROMPT: &str = "Пожалуйста, ответьте 'да' или 'нет'.";
pub const REGISTRATION_CANCELLED: &str =
    "Регистрация отменена. Начните заново, отправив любое сообщение.";
pub const ALREADY_REGISTERED: &str = "Вы уже зарегистрированы на форум. \
Отправьте /help, чтобы увидеть доступные команды.";
pub const REGISTER_FIRST: &str = "Сначала завершите регистрацию.";
pub const FEEDBACK_USAGE: &str = "Пожалуйста, отправьте отзыв в формате: /feedback ваш_отзыв";
pub const FEEDBACK_THANKS: &str = "Спасибо за ваш отзыв!";
pub const NOT_REGISTERED: &str = "Вы не зарегистрированы.";
pub const USER_DELETED: &str = "Ваши данные удалены из системы. Спасибо!";
pub const REMINDERS_ON: &str =
    "Напоминания включены. Мы напомним о форуме за неделю, за 3 дня и накануне.";
pub const REMINDERS_OFF: &str = "Напоминания отключены.";
pub const INTERNAL_ERROR: &str =
    "Извините, произошла ошибка. Пожалуйста, попробуйте позже.";

pub const HELP: &str = "\
Доступные команды:
/start — начать регистрацию
/info — информация о форуме
/faq ваш_вопрос — ответы на частые вопросы
/remind_on — включить напоминания о форуме
/remind_off — отключить напоминания
/feedback ваш_отзыв — оставить отзыв о форуме
/delete_me — удалить свои данные из системы
/help — список всех команд

Также вы можете задавать вопросы о форуме или написать 'оператор', чтобы связаться с поддержкой.";

/// Renders every outbound text from the configured event and contacts.
#[derive(Debug, Clone)]
pub struct Messages {
    event: EventConfig,
    admin: AdminContacts,
}

impl Messages {
    pub fn new(event: EventConfig, admin: AdminContacts) -> Self {
        Self { event, admin }
    }

    /// Greeting sent on first contact, ending with the name prompt and the
    /// data-privacy note.
    pub fn welcome(&self) -> String {
        format!(
            "Добро пожаловать в бот регистрации на {name}!\n\n\
             Я помогу вам зарегистрироваться на форум, который состоится {date} в {location}.\n\n\
             Давайте начнем регистрацию. Пожалуйста, введите ваше полное имя (ФИО).\n\n\
             Ваши данные будут храниться только для регистрации на форум. Подробнее: {privacy}",
            name = self.event.name,
            date = self.event.date,
            location = self.event.location,
            privacy = self.event.privacy_contact,
        )
    }

    pub fn event_info(&self) -> String {
        format!(
            "📅 Дата: {date}\n\
             📍 Место: {location}\n\n\
             Основные темы форума:\n\
             •  Инновации в ESG\n\
             •  Биотехнологии\n\
             •  MED Tech\n\
             •  Циркулярная экономика\n\
             •  Инвестиции в ESG технологии\n\n\
             Для регистрации перейдите по ссылке: {link}\n\n\
             Программа форума:\n\
             10:00–18:00 Выставка технологических компаний\n\
             10:00–11:15 Пленарная сессия\n\
             11:30–13:00 Панельная сессия: цифровые технологии и ЦУР\n\
             13:00–14:00 Перерыв\n\
             14:00–15:30 Панельная сессия: экономика замкнутого цикла\n\
             15:45–16:45 Тренинг для предпринимателей «ESG форсайт»\n\
             17:00–18:15 Invest Talk\n\n\
             Подробнее: {website}",
            date = self.event.date,
            location = self.event.location,
            link = self.event.link,
            website = self.event.website,
        )
    }

    pub fn support(&self) -> String {
        format!(
            "Для связи с организатором:\n\
             Telegram: {}\n\
             Email: {}\n\
             Телефон: {}",
            self.admin.telegram, self.admin.email, self.admin.phone
        )
    }

    /// Summary shown in the Confirmation step.
    pub fn confirmation_summary(&self, user: &User) -> String {
        format!(
            "Пожалуйста, проверьте ваши данные:\n\n\
             👤 ФИО: {}\n\
             📧 Email: {}\n\
             📱 Телефон: {}\n\n\
             Всё верно? Отправьте 'да' для подтверждения или 'нет' для отмены.",
            user.full_name, user.email, user.phone
        )
    }

    /// Immediate reply once the user confirms.
    pub fn registration_success(&self, user: &User) -> String {
        format!(
            "✅ Регистрация успешно завершена!\n\n\
             Мы отправили подтверждение на ваш email: {}\n\n\
             До встречи на форуме!",
            user.email
        )
    }

    /// Body of the confirmation notification (chat and email copy).
    pub fn confirmation_notice(&self, user: &User) -> String {
        format!(
            "✅ Регистрация успешно завершена!\n\n\
             Спасибо за регистрацию на {name}!\n\n\
             Ваши данные:\n\
             👤 ФИО: {full_name}\n\
             📧 Email: {email}\n\
             📱 Телефон: {phone}\n\n\
             Дата мероприятия: {date}\n\
             Место: {location}\n\n\
             До встречи на форуме!",
            name = self.event.name,
            full_name = user.full_name,
            email = user.email,
            phone = user.phone,
            date = self.event.date,
            location = self.event.location,
        )
    }

    pub fn confirmation_subject(&self) -> String {
        format!("{} — подтверждение регистрации", self.event.name)
    }

    pub fn reminder(&self, offset: ReminderOffset) -> String {
        let EventConfig {
            name,
            date,
            location,
            link,
            ..
        } = &self.event;
        match offset {
            ReminderOffset::Week => format!(
                "Напоминание! До {name} осталась неделя! Форум состоится {date}. Подробности: {link}"
            ),
            ReminderOffset::ThreeDays => format!(
                "Напоминание! До {name} осталось 3 дня! Форум состоится {date}. Подробности: {link}"
            ),
            ReminderOffset::OneDay => format!(
                "Последнее напоминание! {name} завтра! {date} в {location}. Подробности: {link}"
            ),
        }
    }
}
