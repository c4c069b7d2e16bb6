/*!
 * caseforge-doc - Requirement-document parsing
 *
 * Extracts text and embedded images from uploaded requirement documents,
 * replaces each image with a numbered placeholder, and substitutes the
 * placeholders with vision-model descriptions so the reassembled text can be
 * fed to the test-case writer.
 */

pub mod describe;
pub mod docx;

pub use describe::{substitute, ImageDescriber};
pub use docx::{parse_document, placeholder, DocImage, ParsedDocument};
