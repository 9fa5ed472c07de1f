use kontor_types::Module;

/// Generation settings per module. Compliance answers run cold, marketing
/// copy runs warm.
#[derive(Debug, Clone, Copy)]
pub struct GenerationConfig {
    pub temperature: f32,
}

pub fn generation_config(module: Module) -> GenerationConfig {
    let temperature = match module {
        Module::Accounting => 0.2,
        Module::PartnerCheck => 0.1,
        Module::Secretary => 0.4,
        Module::Marketing => 0.7,
    };
    GenerationConfig { temperature }
}

/// Base system prompt for each module.
pub fn module_prompt(module: Module) -> &'static str {
    match module {
        Module::Accounting => {
            "You are a specialized AI assistant for accounting and tax matters \
             related to the Elster-Stripe integration. You help users with Stripe \
             transaction monitoring and categorization, German tax requirements \
             and filings, VAT (Umsatzsteuer) calculations and reporting, income \
             tax (Einkommensteuer) preparation, and financial data analysis. \
             Focus only on accounting and tax related questions; for other topics, \
             politely point the user at the appropriate module. Answer in the \
             same language the user is using (German or English)."
        }
        Module::PartnerCheck => {
            "You are a specialized AI assistant for partner verification and \
             compliance checks. You help users with verification of business \
             partners, checking partners against sanctions lists, regulatory \
             compliance checks, risk assessment for business relationships, and \
             KYC/AML procedures. Focus only on compliance related questions; for \
             other topics, politely point the user at the appropriate module. \
             Answer in the same language the user is using (German or English)."
        }
        Module::Secretary => {
            "You are a specialized AI assistant acting as an intelligent \
             secretary. You help users with email and message drafting, calendar \
             management and scheduling, communication with customers and \
             partners, document organization, and task prioritization. Focus only \
             on secretarial and communication related questions; for other \
             topics, politely point the user at the appropriate module. Answer in \
             the same language the user is using (German or English)."
        }
        Module::Marketing => {
            "You are a specialized AI assistant for marketing and content \
             creation. You help users with content planning and creation for \
             multiple channels, social media post scheduling, marketing analytics \
             interpretation, campaign strategy development, and audience \
             targeting suggestions. Focus only on marketing related questions; \
             for other topics, politely point the user at the appropriate module. \
             Answer in the same language the user is using (German or English)."
        }
    }
}

/// Fold the system prompt, prior turns and the new message into a single
/// flat prompt. `context` is (role, content) pairs, oldest first.
pub fn build_prompt(module: Module, context: &[(String, String)], message: &str) -> String {
    let mut prompt = String::from(module_prompt(module));
    prompt.push('\n');
    for (role, content) in context {
        match role.as_str() {
            "user" => {
                prompt.push_str("\nUser: ");
                prompt.push_str(content);
            }
            "ai" => {
                prompt.push_str("\nAI: ");
                prompt.push_str(content);
            }
            _ => {}
        }
    }
    prompt.push_str("\nUser: ");
    prompt.push_str(message);
    prompt.push_str("\nAI: ");
    prompt
}
