use claims_flow::store::CLAIMS_SCHEMA;

pub const INTENT_PROMPT: &str = r#"
Your task is to determine the user's intent based on their message regarding an auto insurance claim.
Classify the intent as one of: "create", "retrieve", or "unknown".

- "create": the user wants to report a new incident or start a new claim.
  Phrases like "I got into an accident", "Someone hit my car", "Need to file a claim".
- "retrieve": the user wants to find existing claim information.
  Phrases like "What's the status of my claim?", "Find claim 123", "Show me claims for John Doe", "List all approved claims".
- "unknown": the intent is unclear, conversational, or not related to creating or retrieving claims.

If the intent is "retrieve", put any specific filtering details (claim ID, policy holder name, status, company, ...)
into "query_details". If no specific details are mentioned (e.g. "show me my claims"), "query_details" must be null.
If the intent is "create" or "unknown", "query_details" must be null.

Respond ONLY with a JSON object of the form {"action": ..., "query_details": ...}. No prose, no code fences.

Examples:
User: I hit a deer this morning.
Output: {"action": "create", "query_details": null}

User: Can you find the claim for policy number POL-123456?
Output: {"action": "retrieve", "query_details": "policy number POL-123456"}

User: What's the status of claim CLM-9876543210?
Output: {"action": "retrieve", "query_details": "claim ID CLM-9876543210"}

User: Show me all claims handled by Ryan Cooper.
Output: {"action": "retrieve", "query_details": "adjuster Ryan Cooper"}

User: List claims for Beta Insurance that are in progress.
Output: {"action": "retrieve", "query_details": "Beta Insurance claims with status Repair in Progress"}

User: Thanks!
Output: {"action": "unknown", "query_details": null}

User: Tell me about my options.
Output: {"action": "unknown", "query_details": null}
"#;

pub const EXTRACTION_PROMPT: &str = r#"
You are an assistant extracting information for an auto insurance claim.
Analyze the user's message and extract ONLY the details they explicitly mention. Possible fields:
- policy_holder_name
- policy_number
- vehicle_make, vehicle_model, vehicle_year (integer)
- incident_date (ISO 8601 date-time; infer relative terms like "yesterday" or "this morning" within the last 24 hours; assume 2025 for partial dates like "January 15th")
- incident_description
- adjuster_name
- status
- company
- claim_office
- point_of_impact (e.g. "front bumper", "driver side door")

Do NOT invent or fill in details that are not present in the user's text. Omit fields that are not mentioned.
Respond ONLY with a JSON object. No prose, no code fences.

Example 1:
User: I wrecked my car this morning by hitting a tree, damaged the front bumper.
Output: {"incident_description": "Hit a tree this morning", "point_of_impact": "front bumper"}

Example 2:
User: Hi, I'm Mark Rivera. My 2019 Chevy Malibu got rear-ended yesterday. The damage is to the back.
Output: {"policy_holder_name": "Mark Rivera", "vehicle_make": "Chevrolet", "vehicle_model": "Malibu", "vehicle_year": 2019, "incident_description": "Rear-ended yesterday", "point_of_impact": "back"}

Example 3:
User: Someone scratched the front passenger side door in the parking lot. I didn't see who did it. The car is a 2022 Honda Civic.
Output: {"vehicle_make": "Honda", "vehicle_model": "Civic", "vehicle_year": 2022, "incident_description": "Scratched in the parking lot. Didn't see who did it", "point_of_impact": "front passenger side door"}
"#;

const SQL_PROMPT_HEAD: &str = r#"
You are an expert SQLite query generator. Create a single SQLite SELECT query that answers the
user's request using the "claims" table.

Database schema:
"#;

const SQL_PROMPT_TAIL: &str = r#"
Rules:
- The table name is claims. Do not reference any other table.
- Generate ONLY one SELECT statement. Never generate INSERT, UPDATE, DELETE, DDL, PRAGMA, or WITH clauses.
- The id column is the primary key (TEXT).
- incident_date is stored as an ISO 8601 date-time string. Use date(), datetime() or strftime() for comparisons, e.g. WHERE date(incident_date) = '2025-01-15'.
- Filter on the details provided in the request.

If the request is valid, respond with {"sql": ..., "explanation": ...} (explanation is optional).
If the request is too vague, or asks for anything other than reading claims, respond with {"error_message": ...}.
Never include both "sql" and "error_message". Respond ONLY with the JSON object. No prose, no code fences.

Examples:
Request: "claim ID CLM-9876543210"
Output: {"sql": "SELECT * FROM claims WHERE id = 'CLM-9876543210';", "explanation": "Selects the claim matching the specified ID."}

Request: "claims for policy holder John Doe"
Output: {"sql": "SELECT * FROM claims WHERE policy_holder_name = 'John Doe';", "explanation": "Selects all claims for the policy holder named John Doe."}

Request: "claims with status Approved for Alpha Insurance"
Output: {"sql": "SELECT * FROM claims WHERE status = 'Approved' AND company = 'Alpha Insurance';", "explanation": "Selects approved claims from Alpha Insurance."}

Request: "claims that happened yesterday"
Output: {"sql": "SELECT * FROM claims WHERE date(incident_date) = date('now', '-1 day');", "explanation": "Selects claims where the incident occurred yesterday."}

Request: "details about a claim"
Output: {"error_message": "Please provide more specific details for the claim you want to retrieve, such as the claim ID or policy number."}

Request: "delete claim 123"
Output: {"error_message": "Sorry, I can only retrieve claim information. I cannot perform delete operations."}
"#;

/// Query generation preamble with the live table definition embedded
pub fn sql_prompt() -> String {
    format!("{SQL_PROMPT_HEAD}{}\n{SQL_PROMPT_TAIL}", CLAIMS_SCHEMA.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_prompt_embeds_schema() {
        let prompt = sql_prompt();
        assert!(prompt.contains("CREATE TABLE IF NOT EXISTS claims"));
        assert!(prompt.contains("point_of_impact TEXT NOT NULL"));
        assert!(prompt.contains(r#"{"error_message": "#));
    }
}
