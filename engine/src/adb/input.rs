use super::AdbClient;
use crate::error::Result;

pub(super) async fn tap(client: &AdbClient, device: &str, x: i32, y: i32) -> Result<()> {
    client
        .run(&[
            "-s",
            device,
            "shell",
            "input",
            "tap",
            &x.to_string(),
            &y.to_string(),
        ])
        .await?;
    Ok(())
}

pub(super) async fn swipe(
    client: &AdbClient,
    device: &str,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
    duration_ms: u64,
) -> Result<()> {
    client
        .run(&[
            "-s",
            device,
            "shell",
            "input",
            "swipe",
            &start_x.to_string(),
            &start_y.to_string(),
            &end_x.to_string(),
            &end_y.to_string(),
            &duration_ms.to_string(),
        ])
        .await?;
    Ok(())
}

/// Escapes a literal string for `adb shell input text`. The shell running on
/// the device splits on whitespace and treats `\ " ' & < > | ;` as
/// metacharacters; spaces are re-encoded as `%s`, the sentinel `input text`
/// itself understands.
pub fn escape_input_text(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            ' ' => escaped.push_str("%s"),
            '\\' | '"' | '\'' | '&' | '<' | '>' | '|' | ';' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub(super) async fn text(client: &AdbClient, device: &str, raw: &str) -> Result<()> {
    let escaped = escape_input_text(raw);
    client
        .run(&["-s", device, "shell", "input", "text", &escaped])
        .await?;
    Ok(())
}

pub(super) async fn key_event(client: &AdbClient, device: &str, key_code: i32) -> Result<()> {
    client
        .run(&[
            "-s",
            device,
            "shell",
            "input",
            "keyevent",
            &key_code.to_string(),
        ])
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_metacharacters_and_spaces() {
        assert_eq!(escape_input_text("hello world"), "hello%sworld");
        assert_eq!(escape_input_text("a\"b"), "a\\\"b");
        assert_eq!(escape_input_text("a&b|c;d"), "a\\&b\\|c\\;d");
        assert_eq!(escape_input_text("<tag>"), "\\<tag\\>");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(escape_input_text("username123"), "username123");
    }
}
