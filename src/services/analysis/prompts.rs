use super::types::StageDefinition;

pub fn financial_analyst_stage() -> StageDefinition {
    StageDefinition {
        name: "document_comprehension".to_string(),
        role: "Senior Financial Analyst".to_string(),
        goal: "Analyze financial documents to provide investment insights and recommendations"
            .to_string(),
        backstory: "With a wealth of experience in financial markets, you are a seasoned analyst \
                    known for your keen eye for detail and insightful investment advice."
            .to_string(),
        description: "Analyze the financial document located at {file_path}. \
                      Provide a detailed analysis of the company's financial health, performance, and market position. \
                      Your analysis should be comprehensive and well-supported by data from the document."
            .to_string(),
        expected_output: "A detailed financial analysis report, including key metrics, trends, and a summary \
                          of the company's financial standing. The report should be easy for investors to understand."
            .to_string(),
    }
}

pub fn investment_advisor_stage() -> StageDefinition {
    StageDefinition {
        name: "investment_recommendation".to_string(),
        role: "Investment Advisor".to_string(),
        goal: "Provide personalized investment advice based on financial analysis".to_string(),
        backstory: "As a trusted investment advisor, you help clients achieve their financial goals \
                    by providing tailored investment strategies based on thorough analysis."
            .to_string(),
        description: "Based on the previous financial analysis, provide clear investment recommendations. \
                      Consider the user's query: {query}. \
                      Evaluate the company's growth potential, risks, and market trends."
            .to_string(),
        expected_output: "A set of clear investment recommendations (e.g., Buy, Hold, Sell) with detailed \
                          justifications. The recommendations should be practical and actionable."
            .to_string(),
    }
}

pub fn build_system_prompt(stage: &StageDefinition) -> String {
    format!(
        "You are {role}.\n{backstory}\n\nYour personal goal is: {goal}",
        role = stage.role,
        backstory = stage.backstory,
        goal = stage.goal
    )
}

pub fn render_description(stage: &StageDefinition, query: &str, file_path: &str) -> String {
    stage
        .description
        .replace("{file_path}", file_path)
        .replace("{query}", query)
}

pub fn build_comprehension_prompt(
    stage: &StageDefinition,
    query: &str,
    file_path: &str,
    document_text: &str,
) -> String {
    format!(
        "Current task: {task}\n\n\
         Document content:\n<document>\n{document}\n</document>\n\n\
         This is the expected criteria for your final answer: {expected}",
        task = render_description(stage, query, file_path),
        document = document_text,
        expected = stage.expected_output
    )
}

pub fn build_recommendation_prompt(
    stage: &StageDefinition,
    query: &str,
    file_path: &str,
    analysis: &str,
) -> String {
    format!(
        "Current task: {task}\n\n\
         Context from the previous financial analysis:\n<analysis>\n{analysis}\n</analysis>\n\n\
         This is the expected criteria for your final answer: {expected}",
        task = render_description(stage, query, file_path),
        analysis = analysis,
        expected = stage.expected_output
    )
}

pub fn compose_report(
    comprehension: &StageDefinition,
    analysis: &str,
    recommendation_stage: &StageDefinition,
    recommendation: &str,
) -> String {
    format!(
        "## {}\n\n{}\n\n## {}\n\n{}",
        comprehension.role,
        analysis.trim(),
        recommendation_stage.role,
        recommendation.trim()
    )
}
