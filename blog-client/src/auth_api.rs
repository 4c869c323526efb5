use reqwest::Method;
use serde::Serialize;

use crate::envelope::ApiResponse;
use crate::error::BlogClientResult;
use crate::http_client::HttpClient;
use crate::models::LoginData;

#[derive(Debug, Serialize)]
struct LoginRequestDto<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequestDto<'a> {
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone)]
/// Клиент `/auth/*`. Запросы уходят без заголовка авторизации.
pub struct AuthApi {
    http: HttpClient,
}

impl AuthApi {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Вход по email и паролю. Поля не валидируются и уходят как есть.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> BlogClientResult<ApiResponse<LoginData>> {
        let payload = LoginRequestDto { email, password };
        self.http
            .send(Method::POST, "/auth/login", Some(&payload), None)
            .await
    }

    /// Регистрация. Форма `data` в ответе сервером не описана.
    pub async fn register(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
    ) -> BlogClientResult<ApiResponse<serde_json::Value>> {
        let payload = RegisterRequestDto {
            first_name,
            last_name,
            email,
            password,
        };
        self.http
            .send(Method::POST, "/auth/register", Some(&payload), None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_payload_uses_camel_case() {
        let payload = RegisterRequestDto {
            first_name: "Ada",
            last_name: "Lovelace",
            email: "ada@example.com",
            password: "",
        };
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["lastName"], "Lovelace");
        assert_eq!(json["password"], "");
    }
}
