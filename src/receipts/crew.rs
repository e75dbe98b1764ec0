//! The two-agent receipt processing crew.
//!
//! The extractor lists the PDFs, pulls company name and total out of each
//! one and saves the list; the aggregator reads that list back, sums the
//! totals per company and saves the result.

use std::sync::Arc;

use crate::agent::Agent;
use crate::crew::Crew;
use crate::crews::crew_output::CrewOutput;
use crate::llms::base_llm::BaseLLM;
use crate::llms::providers::gemini::GeminiCompletion;
use crate::task::Task;
use crate::tools::receipt_tools::ReceiptTools;
use crate::utilities::config::ReceiptConfig;
use crate::utilities::errors::CrewError;
use crate::utilities::printer::{rule, Printer, PrinterColor};

pub const EXTRACTOR_ROLE: &str = "Receipt Data Extractor";
pub const AGGREGATOR_ROLE: &str = "Data Aggregation Specialist";

const EXTRACTOR_GOAL: &str =
    "Extract company name and total amount from receipt PDFs with high accuracy";
const EXTRACTOR_BACKSTORY: &str = "You are an expert at reading and parsing receipt documents. \
You have years of experience in OCR and data extraction from various receipt formats. \
You always return data in the exact JSON format requested: \
{\"company_name\": \"name\", \"total_amount\": \"amount\"}\n\n\
You are powered by Google's Gemini model, which gives you excellent \
text understanding and pattern recognition capabilities.";

const AGGREGATOR_GOAL: &str =
    "Aggregate receipt data by company name and calculate total amounts";
const AGGREGATOR_BACKSTORY: &str = "You are a data analysis expert who specializes in aggregating and \
summarizing financial data. You excel at grouping data by categories and \
performing accurate calculations. You always return clean, organized results.\n\n\
You are powered by Google's Gemini model, giving you strong analytical \
and mathematical reasoning capabilities.";

/// Steps printed when processing fails.
pub const TROUBLESHOOTING_HINTS: [&str; 3] = [
    "Make sure your Google API key is valid",
    "Check if PDF files exist in the specified directory",
    "Ensure the configured model name is available to your key",
];

/// Numbered troubleshooting steps.
pub fn troubleshooting() -> String {
    let mut lines = vec!["Troubleshooting:".to_string()];
    lines.extend(
        TROUBLESHOOTING_HINTS
            .iter()
            .enumerate()
            .map(|(i, hint)| format!("{}. {}", i + 1, hint)),
    );
    lines.join("\n")
}

/// Receipt extraction and aggregation crew.
#[derive(Debug)]
pub struct ReceiptProcessingCrew {
    pub config: ReceiptConfig,
    pub tools: ReceiptTools,
    pub extraction_agent: Agent,
    pub aggregation_agent: Agent,
}

impl ReceiptProcessingCrew {
    /// Build the crew around `llm`; both agents share it.
    pub fn new(config: ReceiptConfig, llm: Arc<dyn BaseLLM>) -> Self {
        let tools = ReceiptTools::new(config.working_dir.clone());
        let extraction_agent = Self::create_extraction_agent(&config, &tools, Arc::clone(&llm));
        let aggregation_agent = Self::create_aggregation_agent(&config, &tools, llm);
        Self {
            config,
            tools,
            extraction_agent,
            aggregation_agent,
        }
    }

    /// Build the crew with a Gemini model configured from `config`.
    pub fn from_config(config: ReceiptConfig) -> Self {
        let llm = GeminiCompletion::new(config.model.clone(), config.api_key.clone())
            .with_temperature(config.temperature)
            .with_stop(vec!["\nObservation:".to_string()]);
        Self::new(config, Arc::new(llm))
    }

    fn create_extraction_agent(
        config: &ReceiptConfig,
        tools: &ReceiptTools,
        llm: Arc<dyn BaseLLM>,
    ) -> Agent {
        Agent::new(EXTRACTOR_ROLE, EXTRACTOR_GOAL, EXTRACTOR_BACKSTORY, llm)
            .with_tools(tools.extraction_tools())
            .with_max_iter(config.max_iter)
            .with_verbose(config.verbose)
    }

    fn create_aggregation_agent(
        config: &ReceiptConfig,
        tools: &ReceiptTools,
        llm: Arc<dyn BaseLLM>,
    ) -> Agent {
        Agent::new(AGGREGATOR_ROLE, AGGREGATOR_GOAL, AGGREGATOR_BACKSTORY, llm)
            .with_tools(tools.aggregation_tools())
            .with_max_iter(config.max_iter)
            .with_verbose(config.verbose)
    }

    /// Task that extracts every receipt in `pdf_directory`.
    pub fn create_extraction_task(&self, pdf_directory: &str) -> Task {
        let description = format!(
            "Extract receipt data from all PDF files in the directory: {dir}

Step-by-step process:
1. First, list all PDF files in the directory using the list_pdf_files tool
2. For each PDF file found:
   - Use extract_text_from_pdf tool to get the text content
   - Analyze the text to identify the company/store name
   - Find the total amount (final bill amount, usually at the bottom)
   - Create JSON object: {{\"company_name\": \"name\", \"total_amount\": \"number\"}}
3. Collect all extractions into a single list
4. Save the complete list using save_json_data tool as '{file}'

Important rules:
- Extract only the main company/store name (not addresses or other details)
- For total_amount, extract only the number (remove currency symbols like $ or ₹)
- If you can't find a field, use empty string \"\"
- Look for keywords like \"Total\", \"Amount\", \"Bill Total\", \"Grand Total\"
- Be careful to get the final total, not subtotals or tax amounts

Return the final list of all extracted data in JSON format.",
            dir = pdf_directory,
            file = self.config.extracted_file,
        );
        Task::new(
            description,
            "A JSON list containing extracted data from all receipts with company_name and total_amount fields",
        )
        .with_name("extract_receipts")
        .with_agent(EXTRACTOR_ROLE)
        .with_output_json(true)
    }

    /// Task that sums the extracted receipts per company.
    pub fn create_aggregation_task(&self) -> Task {
        let description = format!(
            "Read the extracted receipt data and create aggregated summary by company.

Step-by-step process:
1. Use read_json_file tool to read '{input}'
2. Parse the JSON data to get list of receipts
3. Group all receipts by company_name (exact matches)
4. For each company, sum all the total_amount values
5. Create final aggregated object in format:
   {{
     \"Company Name 1\": total_sum_as_number,
     \"Company Name 2\": total_sum_as_number,
     ...
   }}
6. Save result using save_json_data tool as '{output}'

Important rules:
- Convert all total_amount strings to numbers before summing
- Group by exact company name matches (case-sensitive)
- Handle empty or invalid amounts by treating them as 0
- Return only numeric values in the final result
- If a company appears multiple times, sum all their amounts

Return the final aggregated results showing total spending per company.",
            input = self.config.extracted_file,
            output = self.config.aggregated_file,
        );
        Task::new(
            description,
            "A JSON object with company names as keys and total aggregated amounts as numeric values",
        )
        .with_name("aggregate_receipts")
        .with_agent(AGGREGATOR_ROLE)
        .with_output_json(true)
    }

    /// Run extraction then aggregation over the PDFs in `pdf_directory`.
    pub async fn process_receipts(&self, pdf_directory: &str) -> Result<CrewOutput, CrewError> {
        let tasks = vec![
            self.create_extraction_task(pdf_directory),
            self.create_aggregation_task(),
        ];
        let mut crew = Crew::new(
            vec![self.extraction_agent.clone(), self.aggregation_agent.clone()],
            tasks,
        )
        .with_verbose(self.config.verbose);
        crew.name = Some("receipt_processing".to_string());

        if self.config.verbose {
            let printer = Printer::new();
            printer.print(
                &format!("Starting Receipt Processing with {}...", self.extraction_agent.llm.model()),
                PrinterColor::BoldCyan,
            );
            printer.print(&format!("Agent 1: {}", EXTRACTOR_ROLE), PrinterColor::Cyan);
            printer.print(&format!("Agent 2: {}", AGGREGATOR_ROLE), PrinterColor::Cyan);
            printer.print(&rule('-', 60), PrinterColor::Cyan);
        }
        log::info!(
            "Processing receipts in {} with {}",
            pdf_directory,
            self.extraction_agent.llm.model()
        );

        crew.kickoff(None).await
    }
}
