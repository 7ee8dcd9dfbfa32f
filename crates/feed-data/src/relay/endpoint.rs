//! 릴레이 엔드포인트 URL 템플릿.

/// 릴레이 엔드포인트.
///
/// 템플릿에 `{url}`이 있으면 퍼센트 인코딩된 대상 URL로 치환하고,
/// 없으면 템플릿 끝에 붙입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelayEndpoint {
    template: String,
}

impl RelayEndpoint {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// 대상 URL을 릴레이 경유 URL로 변환합니다.
    pub fn wrap(&self, target: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        if self.template.contains("{url}") {
            self.template.replace("{url}", &encoded)
        } else {
            format!("{}{}", self.template, encoded)
        }
    }
}

impl std::fmt::Display for RelayEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.template)
    }
}
