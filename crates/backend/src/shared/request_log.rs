use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Журнал сырых запросов/ответов API-клиента.
/// Без пути ничего не пишет.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    path: Option<PathBuf>,
}

impl RequestLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Файл `<file_name>` в каталоге логов рядом с исполняемым файлом
    pub fn in_log_dir(enabled: bool, file_name: &str) -> Self {
        if !enabled {
            return Self::disabled();
        }
        Self::new(Some(crate::system::tracing::log_dir().join(file_name)))
    }

    /// Записать в лог-файл
    pub fn write(&self, message: &str) {
        let Some(path) = &self.path else {
            return;
        };
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let _ = writeln!(file, "[{}] {}", timestamp, message);
        }
    }

    /// Первые `limit` символов тела ответа
    pub fn preview(body: &str, limit: usize) -> String {
        let preview: String = body.chars().take(limit).collect();
        if preview.len() < body.len() {
            format!("{}...", preview)
        } else {
            preview
        }
    }
}
