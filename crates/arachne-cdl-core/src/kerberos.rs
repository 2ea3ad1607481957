//! SPNEGO tokens from the system Kerberos libraries via GSSAPI.

use libgssapi::context::{ClientCtx, CtxFlags, SecurityContext};
use libgssapi::credential::{Cred, CredUsage};
use libgssapi::name::Name;
use libgssapi::oid::{GSS_MECH_KRB5, GSS_NT_HOSTBASED_SERVICE, OidSet};

use crate::fetch::{NegotiateProvider, NegotiateSession};

/// Uses the user's Kerberos ticket cache (`kinit`) to authenticate.
#[derive(Debug, Default, Clone, Copy)]
pub struct KerberosNegotiate;

impl NegotiateProvider for KerberosNegotiate {
    fn start(&self, host: &str) -> Result<Box<dyn NegotiateSession>, String> {
        let service = format!("HTTP@{}", host);
        let name = Name::new(service.as_bytes(), Some(&GSS_NT_HOSTBASED_SERVICE))
            .and_then(|n| n.canonicalize(Some(&GSS_MECH_KRB5)))
            .map_err(|e| format!("invalid service name {}: {}", service, e))?;

        let mut mechs = OidSet::new().map_err(|e| e.to_string())?;
        mechs.add(&GSS_MECH_KRB5).map_err(|e| e.to_string())?;
        let cred = Cred::acquire(None, None, CredUsage::Initiate, Some(&mechs))
            .map_err(|e| format!("no Kerberos credentials: {}", e))?;

        let ctx = ClientCtx::new(
            Some(cred),
            name,
            CtxFlags::GSS_C_MUTUAL_FLAG,
            Some(&GSS_MECH_KRB5),
        );
        Ok(Box::new(KerberosSession { ctx }))
    }
}

struct KerberosSession {
    ctx: ClientCtx,
}

impl NegotiateSession for KerberosSession {
    fn initial_token(&mut self) -> Result<Vec<u8>, String> {
        match self.ctx.step(None, None) {
            Ok(Some(token)) => Ok(token.to_vec()),
            Ok(None) => Err("GSSAPI produced no initial token".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn verify(&mut self, server_token: &[u8]) -> Result<(), String> {
        self.ctx
            .step(Some(server_token), None)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
