//! 文件名清理和去重

use chrono::Local;
use regex::Regex;
use std::sync::LazyLock;

/// 文件名最大字节数（为去重后缀留出余量）
const MAX_NAME_BYTES: usize = 200;
/// 计数后缀的上限，之后改用时间戳
const MAX_COUNTER: u32 = 9999;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid file name pattern"));

/// 清理上传设备提供的文件名
///
/// 只保留最后一段路径，替换不安全字符，去掉首尾的点和空格。
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let replaced = UNSAFE_CHARS.replace_all(base, "_");
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');

    if trimmed.is_empty() {
        return format!("upload_{}", Local::now().format("%Y%m%d_%H%M%S"));
    }
    truncate_name(trimmed, MAX_NAME_BYTES)
}

/// 拆分为 (主干, 扩展名)，扩展名包含点
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}

fn truncate_name(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    let (stem, ext) = split_extension(name);
    let (stem, ext) = if ext.len() >= max_bytes {
        (name, "")
    } else {
        (stem, ext)
    };
    let mut cut = max_bytes - ext.len();
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &stem[..cut], ext)
}

/// 按顺序给出候选文件名
///
/// `photo.jpg`, `photo (1).jpg`, ..., `photo (9999).jpg`，
/// 最后是带时间戳和随机串的名字。
pub fn candidate_names(name: &str) -> impl Iterator<Item = String> + '_ {
    let (stem, ext) = split_extension(name);
    std::iter::once(name.to_string())
        .chain((1..=MAX_COUNTER).map(move |i| format!("{stem} ({i}){ext}")))
        .chain(std::iter::once_with(move || {
            let token = uuid::Uuid::new_v4().simple().to_string();
            format!(
                "{stem}_{}_{}{ext}",
                Local::now().format("%Y%m%d_%H%M%S"),
                &token[..8]
            )
        }))
}
