/// Certificate documents
///
/// Certificates are rendered once, at issuance, as a self-contained HTML page
/// (printable to PDF from any browser) and stored in the artifact store.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::certificate::CertificateType;
use crate::models::event::Event;
use crate::models::member::Member;

/// Artifact store key of a certificate document
pub fn artifact_key(member_id: Uuid, certificate_id: Uuid) -> String {
    format!("certificates/{}/{}.html", member_id, certificate_id)
}

/// File name offered on download
pub fn download_name(certificate_type: CertificateType, certificate_id: Uuid) -> String {
    format!("certificado-{}-{}.html", certificate_type.as_str(), certificate_id)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the certificate page
pub fn render(
    certificate_id: Uuid,
    certificate_type: CertificateType,
    member: &Member,
    event: Option<&Event>,
    issued_at: DateTime<Utc>,
) -> String {
    let body = match (certificate_type, event) {
        (CertificateType::Evento, Some(event)) => {
            let workload = event
                .workload_hours
                .map(|hours| format!(", com carga horária de {} horas", hours))
                .unwrap_or_default();
            format!(
                "participou do evento <strong>{}</strong>, realizado em {}{}.",
                escape_html(&event.title),
                event.starts_at.format("%d/%m/%Y"),
                workload
            )
        }
        _ => "cumpriu doze meses consecutivos de associação ativa, \
              fazendo jus ao presente certificado."
            .to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: Georgia, serif; text-align: center; margin: 4rem; }}
h1 {{ font-size: 2.2rem; letter-spacing: 0.05em; }}
.name {{ font-size: 1.8rem; margin: 2rem 0; }}
footer {{ margin-top: 4rem; font-size: 0.8rem; color: #555; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>Certificamos que</p>
<p class="name">{name}</p>
<p>CPF {cpf}, {body}</p>
<p>Emitido em {issued}.</p>
<footer>Código de verificação: {id}</footer>
</body>
</html>
"#,
        title = certificate_type.title(),
        name = escape_html(&member.name),
        cpf = escape_html(&member.cpf),
        body = body,
        issued = issued_at.format("%d/%m/%Y"),
        id = certificate_id,
    )
}
