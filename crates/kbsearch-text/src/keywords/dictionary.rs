//! Curated vocabulary for the help-center corpus.
//!
//! `DOMAIN_TERMS` maps surface forms (including common paraphrases) to the
//! canonical term used in page titles. Surfaces are matched after NFKC
//! folding and ASCII lowercasing, so list them in that form.

pub static DOMAIN_TERMS: &[(&str, &str)] = &[
    // feature names
    ("教室コピー", "教室コピー"),
    ("教室の複製", "教室コピー"),
    ("教室", "教室"),
    ("クラス", "教室"),
    ("コピー", "コピー"),
    ("複製", "コピー"),
    ("コース", "コース"),
    ("講座", "コース"),
    ("カリキュラム", "カリキュラム"),
    ("授業", "授業"),
    ("レッスン", "授業"),
    ("時間割", "時間割"),
    ("スケジュール", "スケジュール"),
    ("予定", "スケジュール"),
    ("振替", "振替"),
    ("欠席", "欠席"),
    ("出欠", "出欠"),
    ("出席", "出欠"),
    ("成績", "成績"),
    ("テスト", "テスト"),
    ("課題", "課題"),
    ("宿題", "課題"),
    ("教材", "教材"),
    // people and accounts
    ("生徒", "生徒"),
    ("受講生", "生徒"),
    ("受講者", "生徒"),
    ("保護者", "保護者"),
    ("講師", "講師"),
    ("先生", "講師"),
    ("管理者", "管理者"),
    ("アカウント", "アカウント"),
    ("ログイン", "ログイン"),
    ("パスワード", "パスワード"),
    ("権限", "権限"),
    ("ロール", "権限"),
    ("二段階認証", "二段階認証"),
    // billing
    ("請求", "請求"),
    ("請求書", "請求書"),
    ("月謝", "月謝"),
    ("支払い", "支払い"),
    ("支払", "支払い"),
    ("決済", "支払い"),
    ("口座振替", "口座振替"),
    ("領収書", "領収書"),
    ("契約", "契約"),
    ("プラン", "プラン"),
    ("解約", "解約"),
    // data operations
    ("csv", "CSV"),
    ("インポート", "インポート"),
    ("取り込み", "インポート"),
    ("エクスポート", "エクスポート"),
    ("書き出し", "エクスポート"),
    ("一括登録", "一括登録"),
    ("一括削除", "一括削除"),
    ("削除", "削除"),
    ("アーカイブ", "アーカイブ"),
    ("テンプレート", "テンプレート"),
    // communication
    ("メール", "メール"),
    ("通知", "通知"),
    ("お知らせ", "お知らせ"),
    ("チャット", "チャット"),
    ("連絡帳", "連絡帳"),
    ("lms", "LMS"),
    ("api", "API"),
    ("sso", "SSO"),
    ("議事録", "議事録"),
];

/// Terms that carry no retrieval signal on their own.
pub static STOPWORDS: &[&str] = &[
    "可能", "方法", "場合", "機能", "確認", "質問", "対応", "利用", "使用", "必要",
    "こと", "もの", "ため", "よう", "とき", "ところ", "について", "ください", "教えて",
    "できる", "する", "どう", "なに", "何", "どこ", "いつ", "誰", "ある", "いる",
    "the", "and", "for", "how", "what", "can", "with", "from", "this", "that",
];
