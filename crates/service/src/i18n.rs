//! Message catalog for the languages users can pick on the settings page.

pub const ZH_HANT: &str = "zh-hant";

const ZH_HANT_CATALOG: &[(&str, &str)] = &[
    ("successfully updated profile", "成功更新個人資料"),
    ("Welcome", "歡迎"),
    ("Login with Google", "使用 Google 登入"),
    ("Logout", "登出"),
    ("Settings", "設定"),
    ("Language", "語言"),
    ("Enable auto renew", "啟用自動續借"),
    ("Days before due date", "到期前天數"),
    ("Calendar name", "日曆名稱"),
    ("Library login", "圖書館帳號"),
    ("Library password", "圖書館密碼"),
    ("Leave blank to keep the current password", "留空以保留現有密碼"),
    ("Recent activity", "最近活動"),
    ("Save", "儲存"),
    ("Delete account", "刪除帳戶"),
    ("This field is required.", "這個欄位是必須的。"),
    ("Enter a whole number.", "輸入整數。"),
    ("This field is required as renew is enabled.", "啟用自動續借時必須填寫此欄位。"),
];

/// Translate `msgid` into `lang`, falling back to the msgid itself.
pub fn translate<'a>(lang: &str, msgid: &'a str) -> &'a str {
    let catalog = match lang {
        ZH_HANT => ZH_HANT_CATALOG,
        _ => return msgid,
    };
    catalog.iter().find(|(k, _)| *k == msgid).map(|(_, v)| *v).unwrap_or(msgid)
}

/// Pick `lang` when it is configured, otherwise `default`.
pub fn resolve<'a>(lang: Option<&'a str>, languages: &[String], default: &'a str) -> &'a str {
    match lang {
        Some(l) if languages.iter().any(|x| x == l) => l,
        _ => default,
    }
}

/// Human label for a language code.
pub fn language_name(code: &str) -> &str {
    match code {
        ZH_HANT => "繁體中文",
        "en" => "English",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_known_messages() {
        assert_eq!(translate("zh-hant", "successfully updated profile"), "成功更新個人資料");
        assert_eq!(translate("en", "successfully updated profile"), "successfully updated profile");
        assert_eq!(translate("zh-hant", "unknown"), "unknown");
    }

    #[test]
    fn resolve_falls_back() {
        let langs = vec!["zh-hant".to_string(), "en".to_string()];
        assert_eq!(resolve(Some("zh-hant"), &langs, "en"), "zh-hant");
        assert_eq!(resolve(Some("fr"), &langs, "en"), "en");
        assert_eq!(resolve(None, &langs, "en"), "en");
    }
}
