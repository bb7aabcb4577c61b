use actix_service::{Service, Transform};
use actix_web::{
    Error, ResponseError,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::REFERER,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

use crate::services::AllowList;

/// 拒绝 Referer 不在白名单中的请求（403）
#[derive(Clone)]
pub struct RefererGuard {
    allow_list: Arc<AllowList>,
}

impl RefererGuard {
    pub fn new(allow_list: Arc<AllowList>) -> Self {
        Self { allow_list }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RefererGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RefererGuardMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RefererGuardMiddleware {
            service: Rc::new(service),
            allow_list: self.allow_list.clone(),
        }))
    }
}

pub struct RefererGuardMiddleware<S> {
    service: Rc<S>,
    allow_list: Arc<AllowList>,
}

impl<S, B> Service<ServiceRequest> for RefererGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        // 无法解码为字符串的 Referer 按“不在白名单”处理
        let verdict = match req.headers().get(REFERER) {
            None => self.allow_list.check(None),
            Some(value) => self.allow_list.check(Some(value.to_str().unwrap_or(""))),
        };

        Box::pin(async move {
            if let Err(e) = verdict {
                return Ok(req.into_response(e.error_response().map_into_right_body()));
            }

            trace!("Referer accepted for {}", req.path());
            let res = srv.call(req).await?.map_into_left_body();
            Ok(res)
        })
    }
}
