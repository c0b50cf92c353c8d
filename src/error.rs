use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("failed to read input table {path}: {message}")]
    InputRead { path: String, message: String },

    #[error("could not detect the field delimiter of {0}")]
    #[diagnostic(help("the table needs a header line and a consistent delimiter (, tab ; | or space)"))]
    DelimiterDetection(String),

    #[error("input table is missing required column: {0}")]
    #[diagnostic(help("required columns are Taxon, Genome_link and GFF_link"))]
    MissingColumn(String),

    #[error("failed to parse input table: {0}")]
    InputParse(String),

    #[error("invalid taxon identifier: {0:?}")]
    InvalidTaxon(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("download request failed: {0}")]
    Http(String),

    #[error("download returned status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("required tool not found: {0}")]
    #[diagnostic(help("install gffread or point --gffread / KIRA_GFFREAD at the binary"))]
    MissingTool(String),

    #[error("protein extraction failed: {0}")]
    ExtractorFailed(String),

    #[error("unreadable extractor output: {0}")]
    ExtractorOutput(String),

    #[error("duplicate sequence record: {0}")]
    DuplicateRecord(String),

    #[error("sequence record {0} has no protein_id attribute")]
    MissingProteinId(String),

    #[error("annotation parse error at line {line}: {message}")]
    AnnotationParse { line: usize, message: String },

    #[error("CDS feature {feature} has no {qualifier} qualifier")]
    MissingQualifier { feature: String, qualifier: String },

    #[error("protein {protein} of gene {gene} is missing from the extracted sequences")]
    ProteinNotFound { gene: String, protein: String },
}
