//! tests/auth_tests.rs
//! JWTs de instancia y de usuario, y resolución del contexto de gateway.

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::services::auth_service::{AuthError, AuthService};

    fn auth() -> AuthService {
        AuthService::new(
            "secreto-test".to_string(),
            60,
            60,
            Some("default.uazapi.com".to_string()),
        )
    }

    #[test]
    fn test_instance_jwt_roundtrip() {
        let svc = auth();
        let jwt = svc
            .issue_instance_jwt("tok-instancia", Some("Sucursal"), Some("5531999998888"))
            .unwrap();
        let claims = svc.decode(&jwt).unwrap();
        assert_eq!(claims["sub"], "luna-user");
        assert_eq!(claims["instance_token"], "tok-instancia");
        assert_eq!(claims["label"], "Sucursal");
        assert_eq!(claims["number_hint"], "5531999998888");
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn test_user_jwt_claims() {
        let svc = auth();
        let jwt = svc.issue_user_jwt(42, "a@luna.app").unwrap();
        let claims = svc.decode(&jwt).unwrap();
        assert_eq!(claims["iss"], "luna-backend");
        assert_eq!(claims["sub"], "user:42");
        assert_eq!(claims["email"], "a@luna.app");
        assert_eq!(claims["role"], "user");
    }

    #[test]
    fn test_expired_token() {
        // TTL negativo: el exp queda en el pasado, fuera del leeway.
        let svc = AuthService::new("secreto-test".to_string(), -10, -10, None);
        let jwt = svc.issue_instance_jwt("tok", None, None).unwrap();
        match svc.decode(&jwt) {
            Err(AuthError::Expired) => {}
            other => panic!("esperaba Expired, vino {:?}", other.map(|_| "Ok")),
        }
    }

    #[test]
    fn test_tampered_signature() {
        let svc = auth();
        let otro = AuthService::new("otro-secreto".to_string(), 60, 60, None);
        let jwt = otro.issue_instance_jwt("tok", None, None).unwrap();
        match svc.decode(&jwt) {
            Err(AuthError::Invalid(_)) => {}
            other => panic!("esperaba Invalid, vino {:?}", other.map(|_| "Ok")),
        }
    }

    #[test]
    fn test_gateway_ctx_resolution() {
        let svc = auth();

        // instance_token + host default.
        let ctx = svc
            .gateway_ctx(&json!({ "instance_token": "tok1" }))
            .unwrap();
        assert_eq!(ctx.token, "tok1");
        assert_eq!(ctx.host, "default.uazapi.com");

        // El claim legado "token" también sirve y el host del JWT gana.
        let ctx = svc
            .gateway_ctx(&json!({ "token": "tok2", "host": "propio.uazapi.com" }))
            .unwrap();
        assert_eq!(ctx.token, "tok2");
        assert_eq!(ctx.host, "propio.uazapi.com");

        // Sin token de instancia.
        assert_eq!(
            svc.gateway_ctx(&json!({ "sub": "user:1" })).unwrap_err(),
            "JWT sem token de instância"
        );

        // Sin host por ningún lado.
        let sin_host = AuthService::new("s".to_string(), 60, 60, None);
        assert_eq!(
            sin_host.gateway_ctx(&json!({ "token": "tok" })).unwrap_err(),
            "JWT sem host e UAZAPI_HOST não definido"
        );
    }
}
